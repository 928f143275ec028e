//! Boundary rule: classifies a transaction as deposit/transfer/withdraw/system.
use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::model::transaction::Category;

/// The `src`/`tgt` category tags a transaction type contributes to an
/// account's membership set, for the `inferred_accounts[+otc]` pre-scan.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCategTags {
    pub src: String,
    pub tgt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "boundary_type", rename_all = "snake_case")]
pub enum Boundary {
    #[serde(rename = "transactions")]
    Transactions { transaction_categories: HashMap<String, Category> },

    #[serde(rename = "accounts")]
    Accounts { account_following: HashSet<String> },

    #[serde(rename = "accounts+otc")]
    AccountsOtc {
        account_following: HashSet<String>,
        transaction_categories: HashMap<String, Category>,
    },

    #[serde(rename = "inferred_accounts")]
    InferredAccounts {
        account_following: HashSet<String>,
        account_categories: HashMap<String, AccountCategTags>,
        account_order: Vec<String>,
    },

    #[serde(rename = "inferred_accounts+otc")]
    InferredAccountsOtc {
        account_following: HashSet<String>,
        account_categories: HashMap<String, AccountCategTags>,
        account_order: Vec<String>,
        transaction_categories: HashMap<String, Category>,
    },
}

impl Boundary {
    /// Whether this rule needs accounts pre-scanned for their category
    /// (`inferred_accounts[+otc]`).
    pub fn needs_inference(&self) -> bool {
        matches!(self, Boundary::InferredAccounts { .. } | Boundary::InferredAccountsOtc { .. })
    }

    pub fn account_categories(&self) -> Option<&HashMap<String, AccountCategTags>> {
        match self {
            Boundary::InferredAccounts { account_categories, .. }
            | Boundary::InferredAccountsOtc { account_categories, .. } => Some(account_categories),
            _ => None,
        }
    }

    pub fn account_order(&self) -> Option<&[String]> {
        match self {
            Boundary::InferredAccounts { account_order, .. } | Boundary::InferredAccountsOtc { account_order, .. } => {
                Some(account_order)
            }
            _ => None,
        }
    }

    /// Classifies one transaction. `src_categ`/`tgt_categ` are the account
    /// category tags for the `accounts`-family rules (read straight off the
    /// input row for `accounts[+otc]`, or resolved by the pre-scan for
    /// `inferred_accounts[+otc]`); ignored for `transactions`.
    ///
    /// Returns the category and, for the `+otc` variants re-typing a
    /// neither-follows transaction, the new `OTC_<type>` type tag.
    pub fn categorize(
        &self,
        type_tag: &str,
        src_categ: Option<&str>,
        tgt_categ: Option<&str>,
    ) -> (Category, Option<String>) {
        match self {
            Boundary::Transactions { transaction_categories } => {
                (transaction_categories.get(type_tag).copied().unwrap_or(Category::System), None)
            }
            Boundary::Accounts { account_following }
            | Boundary::AccountsOtc { account_following, .. }
            | Boundary::InferredAccounts { account_following, .. }
            | Boundary::InferredAccountsOtc { account_following, .. } => {
                let src_follow = src_categ.map(|c| account_following.contains(c)).unwrap_or(false);
                let tgt_follow = tgt_categ.map(|c| account_following.contains(c)).unwrap_or(false);
                let categ = match (src_follow, tgt_follow) {
                    (true, true) => Category::Transfer,
                    (false, true) => Category::Deposit,
                    (true, false) => Category::Withdraw,
                    (false, false) => Category::System,
                };
                if categ != Category::System {
                    return (categ, None);
                }
                match self {
                    Boundary::AccountsOtc { transaction_categories, .. }
                    | Boundary::InferredAccountsOtc { transaction_categories, .. } => {
                        // The type-table lookup key is the original type tag;
                        // the transaction is *separately* relabeled
                        // "OTC_<type>" for display, after the lookup.
                        let categ = transaction_categories.get(type_tag).copied().unwrap_or(Category::System);
                        (categ, Some(format!("OTC_{type_tag}")))
                    }
                    _ => (Category::System, None),
                }
            }
        }
    }
}

/// The pre-scan that resolves one category per account for
/// `inferred_accounts[+otc]`, mirroring `infer_account_categories` /
/// `Account.update_categ` in the original.
#[derive(Debug, Default)]
pub struct CategoryInference {
    categs: HashMap<String, HashSet<String>>,
}

impl CategoryInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, boundary: &Boundary, src_id: &str, tgt_id: &str, type_tag: &str) {
        let Some(table) = boundary.account_categories() else { return };
        let Some(tags) = table.get(type_tag) else { return };
        self.categs.entry(src_id.to_string()).or_default().insert(tags.src.clone());
        self.categs.entry(tgt_id.to_string()).or_default().insert(tags.tgt.clone());
    }

    /// Resolves every observed account to its final category by walking
    /// `account_order` and picking the first tag present in its set.
    pub fn resolve(&self, boundary: &Boundary) -> HashMap<String, String> {
        let Some(order) = boundary.account_order() else { return HashMap::new() };
        let mut resolved = HashMap::new();
        for (acct_id, tags) in &self.categs {
            if let Some(categ) = order.iter().find(|c| tags.contains(*c)) {
                resolved.insert(acct_id.clone(), categ.clone());
            }
        }
        resolved
    }
}
