//! Client accounts are the tenants. An account's own id is its tenant boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;

use super::{ClientAccountId, Creatable, Exportable, HasTenantOwner, Patchable, Resource};
use crate::services::ServiceError;

#[derive(Debug, Clone, FromRow)]
pub struct ClientAccount {
    pub id: ClientAccountId,
    pub unique_name: String,
    pub display_name: Option<String>,
    pub accounting_currency: Option<String>,
    pub accountant_notes: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicClientAccount {
    pub id: ClientAccountId,
    pub unique_name: String,
    pub display_name: Option<String>,
    pub accounting_currency: Option<String>,
    pub accountant_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClientAccountPatch {
    pub unique_name: Option<String>,
    pub display_name: Option<String>,
    pub accounting_currency: Option<String>,
    pub accountant_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewClientAccount {
    /// Company name; stored in slug form.
    pub unique_name: String,
    pub display_name: Option<String>,
    pub accounting_currency: Option<String>,
    pub accountant_notes: Option<String>,
}

impl Exportable for ClientAccount {
    type Public = PublicClientAccount;

    fn to_public(&self) -> PublicClientAccount {
        PublicClientAccount {
            id: self.id,
            unique_name: self.unique_name.clone(),
            display_name: self.display_name.clone(),
            accounting_currency: self.accounting_currency.clone(),
            accountant_notes: self.accountant_notes.clone(),
        }
    }
}

impl Resource for ClientAccount {
    const NAME: &'static str = "Client account";

    fn id(&self) -> i64 {
        self.id.0
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl HasTenantOwner for ClientAccount {
    fn tenant_id(&self) -> ClientAccountId {
        self.id
    }
}

impl Patchable for ClientAccount {
    type Patch = ClientAccountPatch;

    fn apply_patch(&mut self, patch: ClientAccountPatch) -> Result<(), ServiceError> {
        if let Some(name) = patch.unique_name {
            self.unique_name = slugify(&name)?;
        }
        if let Some(display_name) = patch.display_name {
            let display_name = display_name.trim().to_string();
            if display_name.chars().count() > 50 {
                return Err(ServiceError::ValidationError(
                    "display_name must be at most 50 characters".into(),
                ));
            }
            self.display_name = Some(display_name);
        }
        if let Some(currency) = patch.accounting_currency {
            let currency = currency.trim().to_uppercase();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ServiceError::ValidationError(
                    "accounting_currency must be a three-letter ISO 4217 code".into(),
                ));
            }
            self.accounting_currency = Some(currency);
        }
        if let Some(notes) = patch.accountant_notes {
            if notes.chars().count() > 100 {
                return Err(ServiceError::ValidationError(
                    "accountant_notes must be at most 100 characters".into(),
                ));
            }
            self.accountant_notes = Some(notes);
        }
        Ok(())
    }
}

const COMPANY_FORM_SUFFIXES: [&str; 5] = ["-as", "-asa", "-enk", "-da", "-ans"];

/// URL-safe handle derived from a company name: lower-cased, punctuation
/// dropped, spaces hyphenated, the trailing company form ("AS", "ENK", ...)
/// removed and Nordic letters folded to ASCII.
pub fn slugify(name: &str) -> Result<String, ServiceError> {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.trim().to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        if c.is_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
            in_space = false;
        }
    }

    if let Some(suffix) = COMPANY_FORM_SUFFIXES.iter().find(|s| slug.ends_with(*s)) {
        slug.truncate(slug.len() - suffix.len());
    }

    let slug: String = slug
        .chars()
        .map(|c| match fold_nordic(c) {
            Some(folded) => folded.to_string(),
            None => c.to_string(),
        })
        .collect();

    let len = slug.chars().count();
    if len == 0 || len > 50 {
        return Err(ServiceError::ValidationError(
            "unique_name must be 1 to 50 characters after normalisation".into(),
        ));
    }
    Ok(slug)
}

fn fold_nordic(c: char) -> Option<&'static str> {
    let folded = match c {
        'á' | 'ã' | 'ä' | 'å' | 'æ' => "a",
        'è' | 'é' | 'ë' => "e",
        'í' => "i",
        'ð' => "d",
        'ó' | 'ö' | 'ø' => "o",
        'ú' | 'ü' => "u",
        'ý' => "y",
        'þ' => "th",
        _ => return None,
    };
    Some(folded)
}

impl Creatable for ClientAccount {
    type Draft = NewClientAccount;

    fn from_draft(draft: NewClientAccount, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        let mut account = ClientAccount {
            id: ClientAccountId(0),
            unique_name: String::new(),
            display_name: None,
            accounting_currency: None,
            accountant_notes: None,
            is_active: true,
            created_utc: now,
        };
        account.apply_patch(ClientAccountPatch {
            unique_name: Some(draft.unique_name),
            display_name: draft.display_name,
            accounting_currency: draft.accounting_currency,
            accountant_notes: draft.accountant_notes,
        })?;
        Ok(account)
    }
}

/// Per-tenant document counters. Each kind has its own start value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    Journal,
    Reconciliation,
    SaleInvoice,
    SaleCreditNote,
    PurchaseInvoice,
    PurchaseCreditNote,
    Receipt,
    Payment,
}

impl SequenceKind {
    pub const ALL: [SequenceKind; 8] = [
        SequenceKind::Journal,
        SequenceKind::Reconciliation,
        SequenceKind::SaleInvoice,
        SequenceKind::SaleCreditNote,
        SequenceKind::PurchaseInvoice,
        SequenceKind::PurchaseCreditNote,
        SequenceKind::Receipt,
        SequenceKind::Payment,
    ];

    /// Value handed out by the first allocation.
    pub fn start_value(self) -> i64 {
        match self {
            SequenceKind::Journal | SequenceKind::Reconciliation => 1,
            SequenceKind::SaleInvoice | SequenceKind::SaleCreditNote | SequenceKind::Receipt => {
                10_000
            }
            SequenceKind::PurchaseInvoice
            | SequenceKind::PurchaseCreditNote
            | SequenceKind::Payment => 20_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SequenceKind::Journal => "journal",
            SequenceKind::Reconciliation => "reconciliation",
            SequenceKind::SaleInvoice => "sale_invoice",
            SequenceKind::SaleCreditNote => "sale_credit_note",
            SequenceKind::PurchaseInvoice => "purchase_invoice",
            SequenceKind::PurchaseCreditNote => "purchase_credit_note",
            SequenceKind::Receipt => "receipt",
            SequenceKind::Payment => "payment",
        }
    }

    /// Column on `client_accounts` holding the last allocated value.
    pub fn column(self) -> &'static str {
        match self {
            SequenceKind::Journal => "journal_seq",
            SequenceKind::Reconciliation => "reconciliation_seq",
            SequenceKind::SaleInvoice => "sale_invoice_seq",
            SequenceKind::SaleCreditNote => "sale_credit_note_seq",
            SequenceKind::PurchaseInvoice => "purchase_invoice_seq",
            SequenceKind::PurchaseCreditNote => "purchase_credit_note_seq",
            SequenceKind::Receipt => "receipt_seq",
            SequenceKind::Payment => "payment_seq",
        }
    }

    /// Next value given the last one allocated, if any.
    pub fn next_after(self, last: Option<i64>) -> i64 {
        match last {
            Some(last) => last + 1,
            None => self.start_value(),
        }
    }
}

impl FromStr for SequenceKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SequenceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown sequence kind: {}", s)))
    }
}
