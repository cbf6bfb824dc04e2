//! Assigns an accounting classification to raw transactions.
use crate::core::overrides::OverrideStore;
use crate::core::transaction::{Classification, Direction, OwnedWalletSet, RawTransaction};
use serde::Serialize;

/// Classification together with whether a manual override decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub classification: Classification,
    pub override_applied: bool,
}

impl From<Classification> for Assignment {
    fn from(classification: Classification) -> Self {
        Assignment {
            classification,
            override_applied: false,
        }
    }
}

/// Classifies a transaction. Pure: the same inputs always give the same result.
///
/// Precedence, first match wins:
/// 1. a manual override for the hash,
/// 2. unparseable amount → `Unknown`,
/// 3. both sender and receiver owned → `Transfer`,
/// 4. incoming → `Income`, outgoing → `Expense`,
/// 5. otherwise `Unknown`.
pub fn assign(
    tx: &RawTransaction,
    owned_wallets: &OwnedWalletSet,
    overrides: &OverrideStore,
) -> Assignment {
    if let Some(classification) = overrides.get(&tx.hash) {
        return Assignment {
            classification,
            override_applied: true,
        };
    }

    let classification = if tx.amount.is_none() {
        Classification::Unknown
    } else if owned_wallets.contains(tx.counterparty())
        && owned_wallets.contains(tx.wallet_address())
    {
        Classification::Transfer
    } else {
        match tx.direction {
            Some(Direction::Incoming) => Classification::Income,
            Some(Direction::Outgoing) => Classification::Expense,
            None => Classification::Unknown,
        }
    };

    Assignment {
        classification,
        override_applied: false,
    }
}

pub fn classify(
    tx: &RawTransaction,
    owned_wallets: &OwnedWalletSet,
    overrides: &OverrideStore,
) -> Classification {
    assign(tx, owned_wallets, overrides).classification
}

/// Counts of each classification in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    pub total: usize,
    pub income: usize,
    pub expense: usize,
    pub transfer: usize,
    pub unknown: usize,
    pub overridden: usize,
}

impl ClassificationStats {
    pub fn record(&mut self, assignment: Assignment) {
        self.total += 1;
        match assignment.classification {
            Classification::Income => self.income += 1,
            Classification::Expense => self.expense += 1,
            Classification::Transfer => self.transfer += 1,
            Classification::Unknown => self.unknown += 1,
        }
        if assignment.override_applied {
            self.overridden += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryOverrideBackend;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    const ME: &str = "0xMine0000000000000000000000000000000000001";
    const ME_TOO: &str = "0xMine0000000000000000000000000000000000002";
    const CLIENT: &str = "0xC11e4700000000000000000000000000000000aa";

    fn tx(hash: &str, from: &str, to: &str, direction: Option<Direction>) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            network: "Ethereum".to_string(),
            token: "ETH".to_string(),
            amount: Some(dec!(1)),
            from_address: from.to_string(),
            to_address: to.to_string(),
            direction,
            fee: None,
            notes: String::new(),
        }
    }

    fn wallets() -> OwnedWalletSet {
        OwnedWalletSet::new([ME, ME_TOO])
    }

    fn empty_overrides() -> OverrideStore {
        OverrideStore::open(MemoryOverrideBackend::default()).unwrap()
    }

    #[test]
    fn test_direction_rules() {
        let overrides = empty_overrides();
        let incoming = tx("0x1", CLIENT, ME, Some(Direction::Incoming));
        let outgoing = tx("0x2", ME, CLIENT, Some(Direction::Outgoing));
        let unknown = tx("0x3", ME, CLIENT, None);

        assert_eq!(
            classify(&incoming, &wallets(), &overrides),
            Classification::Income
        );
        assert_eq!(
            classify(&outgoing, &wallets(), &overrides),
            Classification::Expense
        );
        assert_eq!(
            classify(&unknown, &wallets(), &overrides),
            Classification::Unknown
        );
    }

    #[test]
    fn test_transfer_between_owned_wallets() {
        let overrides = empty_overrides();
        // Mixed case on purpose: ownership is case-insensitive.
        let t = tx(
            "0x1",
            &ME.to_uppercase(),
            &ME_TOO.to_lowercase(),
            Some(Direction::Outgoing),
        );
        assert_eq!(
            classify(&t, &wallets(), &overrides),
            Classification::Transfer
        );

        let undetermined = tx("0x2", ME, ME_TOO, None);
        assert_eq!(
            classify(&undetermined, &wallets(), &overrides),
            Classification::Transfer
        );
    }

    #[test]
    fn test_override_wins_over_evidence() {
        let mut overrides = empty_overrides();
        overrides
            .set("0xfeed", Classification::Expense, None)
            .unwrap();
        let t = tx("0xfeed", CLIENT, ME, Some(Direction::Incoming));

        let assignment = assign(&t, &wallets(), &overrides);
        assert_eq!(assignment.classification, Classification::Expense);
        assert!(assignment.override_applied);

        let transfer = tx("0xbeef", ME, ME_TOO, Some(Direction::Outgoing));
        overrides
            .set("0xbeef", Classification::Income, None)
            .unwrap();
        assert_eq!(
            classify(&transfer, &wallets(), &overrides),
            Classification::Income
        );
    }

    #[test]
    fn test_malformed_amount_is_unknown_unless_overridden() {
        let mut overrides = empty_overrides();
        let mut t = tx("0x9", CLIENT, ME, Some(Direction::Incoming));
        t.amount = None;
        assert_eq!(
            classify(&t, &wallets(), &overrides),
            Classification::Unknown
        );

        overrides.set("0x9", Classification::Income, None).unwrap();
        assert_eq!(
            classify(&t, &wallets(), &overrides),
            Classification::Income
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let overrides = empty_overrides();
        let w = wallets();
        let cases = [
            tx("0x1", CLIENT, ME, Some(Direction::Incoming)),
            tx("0x2", ME, CLIENT, Some(Direction::Outgoing)),
            tx("0x3", ME, ME_TOO, Some(Direction::Outgoing)),
            tx("0x4", "", "", None),
        ];
        for t in &cases {
            assert_eq!(assign(t, &w, &overrides), assign(t, &w, &overrides));
        }
    }

    #[test]
    fn test_only_one_side_owned_is_not_transfer() {
        let overrides = empty_overrides();
        let t = tx("0x1", CLIENT, ME, Some(Direction::Incoming));
        assert_ne!(
            classify(&t, &wallets(), &overrides),
            Classification::Transfer
        );
        let empty_counterparty = tx("0x2", ME, "", Some(Direction::Outgoing));
        assert_eq!(
            classify(&empty_counterparty, &wallets(), &overrides),
            Classification::Expense
        );
    }

    #[test]
    fn test_stats() {
        let mut stats = ClassificationStats::default();
        stats.record(Assignment {
            classification: Classification::Income,
            override_applied: false,
        });
        stats.record(Assignment {
            classification: Classification::Expense,
            override_applied: true,
        });
        stats.record(Assignment {
            classification: Classification::Transfer,
            override_applied: false,
        });
        assert_eq!(
            stats,
            ClassificationStats {
                total: 3,
                income: 1,
                expense: 1,
                transfer: 1,
                unknown: 0,
                overridden: 1,
            }
        );
    }
}
