//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use shared::models::{
    DecisionInput, Invoice, InvoiceCreate, InvoiceItemCreate, Merchant, MerchantCreate,
    MerchantStatus, RuleParams, RuleSetCreate, TravelerInput, Voucher, VoucherCreate,
};
use taxfree_server::db::repository::{invoice, merchant, rule_set};
use taxfree_server::notify::SharedNotificationSink;
use taxfree_server::{Config, CurrentUser, DbService, Role, ServerState};

pub const TOKEN_SECRET: &str = "integration-scan-token-secret-0123456789";
pub const JWT_SECRET: &str = "integration-jwt-secret-0123456789abcdef!!";

pub struct Fixture {
    pub state: ServerState,
    pub merchant: Merchant,
}

/// In-memory server state with an approved merchant and an active rule set
pub async fn setup() -> Fixture {
    setup_with_params(RuleParams::default()).await
}

pub async fn setup_with_params(params: RuleParams) -> Fixture {
    let db = DbService::open_in_memory().await.unwrap();
    let state =
        ServerState::with_db(Config::with_secrets(TOKEN_SECRET, JWT_SECRET), db).unwrap();
    seed(state, params).await
}

/// Same as [`setup`] but notifications go to `notifier`
pub async fn setup_with_notifier(notifier: SharedNotificationSink) -> Fixture {
    let db = DbService::open_in_memory().await.unwrap();
    let state = ServerState::with_notifier(
        Config::with_secrets(TOKEN_SECRET, JWT_SECRET),
        db,
        notifier,
    )
    .unwrap();
    seed(state, RuleParams::default()).await
}

async fn seed(state: ServerState, params: RuleParams) -> Fixture {
    let db = state.db.clone();

    let mut tx = db.begin_write().await.unwrap();
    let merchant = merchant::create(
        &mut tx,
        MerchantCreate {
            name: "Galeries Test".into(),
            status: MerchantStatus::Approved,
        },
    )
    .await
    .unwrap();
    rule_set::create(
        &mut tx,
        RuleSetCreate {
            version: "2026.1".into(),
            name: "Default".into(),
            params,
            activate: true,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    Fixture { state, merchant }
}

impl Fixture {
    /// One eligible line: 100 000 with 16 000 VAT, purchased today
    pub async fn invoice(&self) -> Invoice {
        self.invoice_with(Decimal::from(100_000), Decimal::from(16_000))
            .await
    }

    pub async fn invoice_with(&self, line_total: Decimal, vat: Decimal) -> Invoice {
        self.invoice_with_items(vec![line("ELECTRONICS", line_total, vat, true)])
            .await
    }

    pub async fn invoice_with_items(&self, items: Vec<InvoiceItemCreate>) -> Invoice {
        let mut tx = self.state.db.begin_write().await.unwrap();
        let created = invoice::create(
            &mut tx,
            InvoiceCreate {
                merchant_id: self.merchant.id,
                invoice_number: format!("INV-{}", shared::util::snowflake_id()),
                invoice_date: Utc::now().date_naive(),
                currency: "XOF".into(),
                items,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        created
    }

    /// Created and issued voucher for a fresh invoice
    pub async fn issued_voucher(&self) -> Voucher {
        let inv = self.invoice().await;
        let created = self
            .state
            .vouchers
            .create(voucher_request(inv.id, "P1234567"), &self.merchant_user())
            .await
            .unwrap();
        self.state
            .vouchers
            .issue(created.id, &self.merchant_user())
            .await
            .unwrap()
    }

    /// Issued voucher that an agent has already decided on
    pub async fn validated_voucher(&self) -> Voucher {
        let issued = self.issued_voucher().await;
        self.state
            .vouchers
            .record_decision(issued.id, DecisionInput::validated(), &agent("agent-1"))
            .await
            .unwrap();
        self.state.vouchers.get(issued.id).await.unwrap()
    }

    pub fn merchant_user(&self) -> CurrentUser {
        CurrentUser {
            id: "merchant-user-1".into(),
            name: "Shop Clerk".into(),
            role: Role::Merchant,
            exit_point_id: None,
            merchant_id: Some(self.merchant.id),
        }
    }
}

pub fn line(category: &str, line_total: Decimal, vat: Decimal, eligible: bool) -> InvoiceItemCreate {
    InvoiceItemCreate {
        description: format!("{} item", category.to_lowercase()),
        category: category.into(),
        quantity: 1,
        line_total,
        vat_amount: vat,
        is_eligible: eligible,
    }
}

pub fn voucher_request(invoice_id: i64, passport: &str) -> VoucherCreate {
    VoucherCreate {
        invoice_id,
        traveler: TravelerInput {
            passport_number: passport.into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            nationality: "US".into(),
            residence_country: "US".into(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 5, 17),
            email: None,
            keep_passport_copy: false,
        },
    }
}

pub fn agent(id: &str) -> CurrentUser {
    CurrentUser {
        id: id.into(),
        name: format!("Agent {id}"),
        role: Role::Agent,
        exit_point_id: Some("AIBD".into()),
        merchant_id: None,
    }
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        id: "admin-1".into(),
        name: "Supervisor".into(),
        role: Role::Admin,
        exit_point_id: None,
        merchant_id: None,
    }
}

pub fn operator() -> CurrentUser {
    CurrentUser {
        id: "operator-1".into(),
        name: "Refund Desk".into(),
        role: Role::Operator,
        exit_point_id: None,
        merchant_id: None,
    }
}
