//! Voucher state machine
//!
//! `CREATED → ISSUED → VALIDATION_PENDING → {VALIDATED, REFUSED} → REFUNDED`,
//! with `EXPIRED` and `CANCELLED` as terminal side-exits. Every mutation and
//! its audit entry share one write transaction.

use serde_json::json;
use shared::models::{
    DecisionInput, Invoice, MerchantStatus, RuleSnapshot, ScanRequest, ScanResult, Traveler,
    TravelerInput, Validation, ValidationDecision, Voucher, VoucherCreate, VoucherQuery,
    VoucherStatus,
};
use shared::util::{DAY_MILLIS, millis_to_date, now_millis, snowflake_id};
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqliteConnection;

use super::rules::{
    self, FREQUENT_TRAVELER_WINDOW_DAYS, RiskContext, compute_amounts, generate_voucher_number,
};
use crate::audit::{AuditAction, AuditEvent, AuditStorage};
use crate::auth::{CurrentUser, Role};
use crate::db::DbService;
use crate::db::repository::{
    RepoError, invoice, merchant, rule_set, traveler, validation, voucher,
};
use crate::eligibility::{self, EligibilityInput};
use crate::token::TokenSigner;
use crate::utils::validation::{
    MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, validate_code, validate_optional_text,
    validate_required_text,
};

/// Attempts at drawing an unused voucher number
const VOUCHER_NUMBER_ATTEMPTS: usize = 5;

/// Where an offline decision came from
#[derive(Debug, Clone)]
pub struct OfflineOrigin {
    pub batch_id: String,
    /// Client clock at decision time (ms)
    pub timestamp: i64,
}

/// Voucher lifecycle service
#[derive(Clone, Debug)]
pub struct VoucherLifecycle {
    db: DbService,
    signer: TokenSigner,
    audit: AuditStorage,
}

impl VoucherLifecycle {
    pub fn new(db: DbService, signer: TokenSigner) -> Self {
        Self {
            audit: AuditStorage::new(db.clone()),
            db,
            signer,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    // ========== Creation ==========

    /// Create a voucher for a registered invoice
    pub async fn create(&self, data: VoucherCreate, actor: &CurrentUser) -> AppResult<Voucher> {
        validate_traveler(&data.traveler)?;

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;

        let invoice = invoice::find_by_id(&mut tx, data.invoice_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::InvoiceNotFound))?;
        if actor.role == Role::Merchant && actor.merchant_id != Some(invoice.merchant_id) {
            return Err(AppError::permission_denied(
                "Invoice belongs to another merchant",
            ));
        }
        if invoice.is_cancelled {
            return Err(AppError::new(ErrorCode::InvoiceCancelled)
                .with_detail("invoice_id", invoice.id));
        }
        if let Some(existing) = voucher::find_by_invoice(&mut tx, invoice.id).await? {
            return Err(AppError::new(ErrorCode::VoucherAlreadyExists)
                .with_detail("voucher_number", existing.voucher_number));
        }

        let merchant = merchant::find_by_id(&mut tx, invoice.merchant_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::MerchantNotFound))?;
        let active = rule_set::find_active(&mut tx)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::NoActiveRuleSet))?;
        let snapshot = RuleSnapshot::from(&active);
        let params = &active.params;

        let traveler = upsert_traveler(&mut tx, &data.traveler, now).await?;
        let traveler_age = millis_to_date(now).and_then(|today| traveler.age_on(today));
        let amounts = compute_amounts(&invoice, &snapshot);

        // 资格检查：全部失败项一起返回
        let mut failed: Vec<String> = Vec::new();
        if merchant.status != MerchantStatus::Approved {
            failed.push(format!("Merchant {} is not approved", merchant.name));
        }
        if let Some(age) = traveler_age
            && age < params.min_age
        {
            failed.push(format!(
                "Traveler is {age}, minimum age is {}",
                params.min_age
            ));
        }
        let residence = traveler.residence_country.as_str();
        if params
            .excluded_residence_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(residence))
        {
            failed.push(format!("Residents of {residence} are not eligible"));
        } else if !params.eligible_residence_countries.is_empty()
            && !params
                .eligible_residence_countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(residence))
        {
            failed.push(format!("Residence {residence} is not in the eligible list"));
        }
        if amounts.eligible < params.min_purchase_amount {
            failed.push(format!(
                "Eligible amount {} is below the minimum of {}",
                amounts.eligible, params.min_purchase_amount
            ));
        }
        if amounts.eligible_items == 0 {
            failed.push("No eligible line items".to_string());
        } else if amounts.refund <= rust_decimal::Decimal::ZERO {
            failed.push("Refund amount after fees is not positive".to_string());
        }
        if !failed.is_empty() {
            tracing::info!(invoice_id = invoice.id, failed = failed.len(), "Voucher creation refused");
            return Err(AppError::new(ErrorCode::VoucherNotEligible)
                .with_detail("failed_checks", failed));
        }

        let recent = traveler::count_vouchers_since(
            &mut tx,
            traveler.id,
            now - FREQUENT_TRAVELER_WINDOW_DAYS * DAY_MILLIS,
        )
        .await?;
        let risk = rules::assess_risk(
            &RiskContext {
                invoice_total: invoice.total_amount,
                eligible_amount: amounts.eligible,
                vat_amount: amounts.vat,
                nationality: &traveler.nationality,
                residence_country: residence,
                item_count: amounts.eligible_items,
                traveler_age,
                recent_vouchers: recent,
            },
            params,
        );

        let mut new_voucher = Voucher {
            id: snowflake_id(),
            voucher_number: String::new(),
            invoice_id: invoice.id,
            traveler_id: traveler.id,
            merchant_id: invoice.merchant_id,
            created_by: actor.id.clone(),
            currency: invoice.currency.clone(),
            eligible_amount: amounts.eligible,
            vat_amount: amounts.vat,
            operator_fee: amounts.fee,
            refund_amount: amounts.refund,
            status: VoucherStatus::Created,
            issued_at: None,
            expires_at: now + i64::from(snapshot.exit_deadline_months) * 30 * DAY_MILLIS,
            validated_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            risk_score: risk.score,
            risk_flags: risk.flags,
            requires_control: risk.requires_control,
            token_payload: None,
            token_signature: None,
            rule_snapshot: snapshot,
            created_at: now,
            updated_at: now,
        };
        insert_with_fresh_number(&mut tx, &mut new_voucher, now).await?;

        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::VoucherCreated, "voucher", new_voucher.id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "voucher_number": new_voucher.voucher_number,
                    "invoice_id": invoice.id,
                    "refund_amount": new_voucher.refund_amount,
                    "risk_score": new_voucher.risk_score,
                    "requires_control": new_voucher.requires_control,
                })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            voucher_id = new_voucher.id,
            voucher_number = %new_voucher.voucher_number,
            risk_score = new_voucher.risk_score,
            "Voucher created"
        );
        Ok(new_voucher)
    }

    /// `CREATED → ISSUED`; repeating on an issued voucher returns it unchanged
    pub async fn issue(&self, voucher_id: i64, actor: &CurrentUser) -> AppResult<Voucher> {
        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_voucher(&mut tx, voucher_id).await?;
        check_merchant_scope(actor, &current)?;

        if current.status != VoucherStatus::Created {
            if current.issued_at.is_some() && current.token_payload.is_some() {
                tracing::debug!(voucher_id, "Voucher already issued, returning as is");
                return Ok(current);
            }
            return Err(invalid_status(&current, "issue"));
        }

        let token = self.signer.sign(&current);
        if !voucher::mark_issued(&mut tx, voucher_id, now, &token.payload, &token.signature).await? {
            return Err(invalid_status(&current, "issue"));
        }
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::VoucherIssued, "voucher", voucher_id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({ "voucher_number": current.voucher_number })),
        )
        .await?;
        let issued = load_voucher(&mut tx, voucher_id).await?;
        tx.commit().await?;

        tracing::info!(voucher_id, voucher_number = %issued.voucher_number, "Voucher issued");
        Ok(issued)
    }

    // ========== Decisions ==========

    /// Record an agent decision; at most one per voucher
    pub async fn record_decision(
        &self,
        voucher_id: i64,
        input: DecisionInput,
        actor: &CurrentUser,
    ) -> AppResult<Validation> {
        let exit_point = actor.require_exit_point()?.to_string();
        validate_decision_text(&input)?;

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let recorded =
            record_decision_in(&mut tx, voucher_id, &input, actor, &exit_point, None, now).await?;
        tx.commit().await?;

        tracing::info!(
            voucher_id,
            decision = %recorded.decision,
            agent_id = %actor.id,
            "Customs decision recorded"
        );
        Ok(recorded)
    }

    /// `CREATED | ISSUED → CANCELLED`
    pub async fn cancel(
        &self,
        voucher_id: i64,
        reason: &str,
        actor: &CurrentUser,
    ) -> AppResult<Voucher> {
        validate_required_text(reason, "reason", MAX_NOTE_LEN)?;
        let reason = reason.trim();

        let now = now_millis();
        let mut tx = self.db.begin_write().await?;
        let current = load_voucher(&mut tx, voucher_id).await?;
        check_merchant_scope(actor, &current)?;

        if !current.can_be_cancelled()
            || !voucher::cancel(&mut tx, voucher_id, &actor.id, reason, now).await?
        {
            return Err(invalid_status(&current, "cancel"));
        }
        AuditStorage::append_in(
            &mut tx,
            AuditEvent::new(AuditAction::VoucherCancelled, "voucher", voucher_id)
                .actor(&actor.id, &actor.name)
                .metadata(json!({
                    "previous_status": current.status,
                    "reason": reason,
                })),
        )
        .await?;
        let cancelled = load_voucher(&mut tx, voucher_id).await?;
        tx.commit().await?;

        tracing::info!(voucher_id, "Voucher cancelled");
        Ok(cancelled)
    }

    // ========== Reads ==========

    pub async fn get(&self, voucher_id: i64) -> AppResult<Voucher> {
        let mut conn = self.db.conn().await?;
        load_voucher(&mut conn, voucher_id).await
    }

    pub async fn find_by_number(&self, voucher_number: &str) -> AppResult<Voucher> {
        let mut conn = self.db.conn().await?;
        voucher::find_by_number(&mut conn, voucher_number.trim())
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::VoucherNotFound))
    }

    pub async fn list(&self, query: &VoucherQuery) -> AppResult<Vec<Voucher>> {
        let mut conn = self.db.conn().await?;
        Ok(voucher::list(&mut conn, query).await?)
    }

    pub async fn validation_of(&self, voucher_id: i64) -> AppResult<Option<Validation>> {
        let mut conn = self.db.conn().await?;
        Ok(validation::find_by_voucher(&mut conn, voucher_id).await?)
    }

    /// Look a voucher up by signed token or number and run the eligibility checks
    pub async fn scan(&self, request: &ScanRequest, actor: &CurrentUser) -> AppResult<ScanResult> {
        let now = now_millis();
        let (scanned, report) = {
            let mut conn = self.db.conn().await?;
            let scanned = match (&request.token, &request.voucher_number) {
                (Some(token), _) => {
                    let claims = self.signer.decode(token.trim()).ok_or_else(|| {
                        tracing::warn!(agent_id = %actor.id, "Scan token failed verification");
                        AppError::new(ErrorCode::ScanTokenInvalid)
                    })?;
                    let id = claims
                        .voucher_id()
                        .ok_or_else(|| AppError::new(ErrorCode::ScanTokenInvalid))?;
                    let found = load_voucher(&mut conn, id).await?;
                    if found.voucher_number != claims.voucher_number {
                        return Err(AppError::new(ErrorCode::ScanTokenInvalid));
                    }
                    found
                }
                (None, Some(number)) => voucher::find_by_number(&mut conn, number.trim())
                    .await?
                    .ok_or_else(|| AppError::new(ErrorCode::VoucherNotFound))?,
                (None, None) => {
                    return Err(AppError::validation("Either token or voucher_number is required"));
                }
            };

            let existing = validation::find_by_voucher(&mut conn, scanned.id).await?;
            let inv = load_invoice(&mut conn, scanned.invoice_id).await?;
            let report = eligibility::evaluate(
                &EligibilityInput {
                    voucher: &scanned,
                    validation: existing.as_ref(),
                    invoice_date: inv.invoice_date,
                },
                now,
            );
            (scanned, report)
        };

        // 连接已释放，再写审计
        self.audit
            .append(
                AuditEvent::new(AuditAction::VoucherScanned, "voucher", scanned.id)
                    .actor(&actor.id, &actor.name)
                    .metadata(json!({
                        "voucher_number": scanned.voucher_number,
                        "overall": report.overall,
                        "exit_point_id": actor.exit_point_id,
                    })),
            )
            .await;

        tracing::info!(
            voucher_id = scanned.id,
            overall = ?report.overall,
            agent_id = %actor.id,
            "Voucher scanned"
        );
        let can_validate = report.can_validate;
        Ok(ScanResult {
            voucher: scanned,
            report,
            can_validate,
        })
    }
}

/// Apply one decision inside the caller's transaction
///
/// Shared by the online path and offline sync. A second decision for the
/// same voucher is [`ErrorCode::AlreadyValidated`] with the stored decision
/// under the `server_validation` detail.
pub(crate) async fn record_decision_in(
    conn: &mut SqliteConnection,
    voucher_id: i64,
    input: &DecisionInput,
    actor: &CurrentUser,
    exit_point_id: &str,
    offline: Option<&OfflineOrigin>,
    now: i64,
) -> AppResult<Validation> {
    let current = load_voucher(conn, voucher_id).await?;

    if let Some(existing) = validation::find_by_voucher(conn, voucher_id).await? {
        return Err(already_validated(&existing));
    }

    match (input.decision, input.refusal_reason) {
        (ValidationDecision::Refused, None) => {
            return Err(AppError::new(ErrorCode::RefusalReasonRequired));
        }
        (ValidationDecision::Validated | ValidationDecision::ControlRequired, Some(_)) => {
            return Err(AppError::new(ErrorCode::RefusalReasonNotAllowed));
        }
        _ => {}
    }

    if !current.is_open_for_decision(now) {
        if !current.status.is_scannable() {
            return Err(invalid_status(&current, "record a decision on"));
        }
        return Err(AppError::new(ErrorCode::VoucherExpired)
            .with_detail("voucher_number", current.voucher_number.clone()));
    }

    let record = Validation {
        id: snowflake_id(),
        voucher_id,
        decision: input.decision,
        refusal_reason: input.refusal_reason,
        refusal_details: input.refusal_details.clone(),
        physical_control_done: input.physical_control_done,
        control_notes: input.control_notes.clone(),
        agent_id: actor.id.clone(),
        agent_name: actor.name.clone(),
        exit_point_id: Some(exit_point_id.to_string()),
        decided_at: now,
        is_offline: offline.is_some(),
        offline_batch_id: offline.map(|o| o.batch_id.clone()),
        offline_timestamp: offline.map(|o| o.timestamp),
        synced_at: offline.map(|_| now),
    };

    match validation::insert(conn, &record).await {
        Ok(()) => {}
        Err(RepoError::Duplicate(_)) => {
            // 唯一约束兜底
            return Err(match validation::find_by_voucher(conn, voucher_id).await? {
                Some(existing) => already_validated(&existing),
                None => AppError::new(ErrorCode::AlreadyValidated),
            });
        }
        Err(e) => return Err(e.into()),
    }

    let (status, validated_at, action) = match input.decision {
        ValidationDecision::Validated => {
            (VoucherStatus::Validated, Some(now), AuditAction::CustomsValidated)
        }
        ValidationDecision::Refused => (VoucherStatus::Refused, None, AuditAction::CustomsRefused),
        ValidationDecision::ControlRequired => (
            VoucherStatus::ValidationPending,
            None,
            AuditAction::CustomsControlRequired,
        ),
    };
    if !voucher::apply_decision(conn, voucher_id, status, validated_at, now).await? {
        return Err(invalid_status(&current, "record a decision on"));
    }

    AuditStorage::append_in(
        conn,
        AuditEvent::new(action, "voucher", voucher_id)
            .actor(&actor.id, &actor.name)
            .metadata(json!({
                "voucher_number": current.voucher_number,
                "decision": input.decision,
                "refusal_reason": input.refusal_reason,
                "exit_point_id": exit_point_id,
                "physical_control_done": input.physical_control_done,
                "is_offline": offline.is_some(),
                "offline_batch_id": offline.map(|o| o.batch_id.as_str()),
            })),
    )
    .await?;

    Ok(record)
}

pub(crate) fn validate_decision_text(input: &DecisionInput) -> AppResult<()> {
    validate_optional_text(&input.refusal_details, "refusal_details", MAX_NOTE_LEN)?;
    validate_optional_text(&input.control_notes, "control_notes", MAX_NOTE_LEN)?;
    Ok(())
}

fn already_validated(existing: &Validation) -> AppError {
    let snapshot = existing.snapshot();
    AppError::new(ErrorCode::AlreadyValidated).with_detail(
        "server_validation",
        serde_json::to_value(&snapshot).unwrap_or_default(),
    )
}

pub(crate) fn invalid_status(current: &Voucher, operation: &str) -> AppError {
    AppError::with_message(
        ErrorCode::VoucherInvalidStatus,
        format!(
            "Cannot {operation} voucher {} in status {}",
            current.voucher_number, current.status
        ),
    )
    .with_detail("status", current.status.as_str())
}

pub(crate) async fn load_voucher(conn: &mut SqliteConnection, id: i64) -> AppResult<Voucher> {
    voucher::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::VoucherNotFound).with_detail("voucher_id", id))
}

async fn load_invoice(conn: &mut SqliteConnection, id: i64) -> AppResult<Invoice> {
    invoice::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::InvoiceNotFound))
}

fn check_merchant_scope(actor: &CurrentUser, current: &Voucher) -> AppResult<()> {
    if actor.role == Role::Merchant && actor.merchant_id != Some(current.merchant_id) {
        return Err(AppError::permission_denied("Voucher belongs to another merchant"));
    }
    Ok(())
}

fn validate_traveler(input: &TravelerInput) -> AppResult<()> {
    validate_required_text(&input.passport_number, "passport_number", 20)?;
    validate_required_text(&input.first_name, "first_name", MAX_NAME_LEN)?;
    validate_required_text(&input.last_name, "last_name", MAX_NAME_LEN)?;
    validate_code(&input.nationality, "nationality", 2)?;
    validate_code(&input.residence_country, "residence_country", 2)?;
    validate_optional_text(&input.email, "email", MAX_EMAIL_LEN)?;
    Ok(())
}

/// Reuse the traveler with the same passport hash or register a new one
async fn upsert_traveler(
    conn: &mut SqliteConnection,
    input: &TravelerInput,
    now: i64,
) -> AppResult<Traveler> {
    let hash = rules::passport_hash(&input.passport_number);
    let copy = input
        .keep_passport_copy
        .then(|| rules::normalize_passport(&input.passport_number));

    let fresh = Traveler {
        id: snowflake_id(),
        passport_hash: hash.clone(),
        passport_last4: rules::passport_last4(&input.passport_number),
        passport_copy: copy,
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        nationality: input.nationality.to_uppercase(),
        residence_country: input.residence_country.to_uppercase(),
        date_of_birth: input.date_of_birth,
        email: input.email.clone(),
        created_at: now,
    };

    match traveler::find_by_hash(conn, &hash).await? {
        Some(existing) => {
            let updated = Traveler {
                id: existing.id,
                created_at: existing.created_at,
                ..fresh
            };
            traveler::update_contact(conn, &updated).await?;
            Ok(traveler::find_by_id(conn, existing.id)
                .await?
                .unwrap_or(updated))
        }
        None => {
            traveler::insert(conn, &fresh).await?;
            Ok(fresh)
        }
    }
}

async fn insert_with_fresh_number(
    conn: &mut SqliteConnection,
    new_voucher: &mut Voucher,
    now: i64,
) -> AppResult<()> {
    for attempt in 1..=VOUCHER_NUMBER_ATTEMPTS {
        new_voucher.voucher_number = generate_voucher_number(now);
        match voucher::insert(conn, new_voucher).await {
            Ok(()) => return Ok(()),
            Err(RepoError::Duplicate(msg)) if msg.contains("voucher_number") => {
                tracing::warn!(attempt, "Voucher number collision, retrying");
            }
            Err(RepoError::Duplicate(_)) => {
                return Err(AppError::new(ErrorCode::VoucherAlreadyExists));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::internal("Could not allocate a unique voucher number"))
}
