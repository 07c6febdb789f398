//! Store key layout shared by the trackers and stores.

use crate::traits::StoreKey;

/// Partition holding per-subject statistics.
pub fn subject_partition(subject_id: &str) -> String {
    format!("SUBJECT#{}", subject_id)
}

/// Partition holding per-conversation records.
pub fn conversation_partition(conversation_id: &str) -> String {
    format!("CONV#{}", conversation_id)
}

/// Partition holding one scope's learned aliases.
pub fn alias_partition(scope_id: &str) -> String {
    format!("ALIAS#{}", scope_id)
}

/// Key of an EMA record.
pub fn ema_key(subject_id: &str, metric_key: &str) -> StoreKey {
    StoreKey::new(subject_partition(subject_id), format!("EMA#{}", metric_key))
}

/// Key of a pattern habit record.
pub fn habit_key(conversation_id: &str, subject_id: &str, activity_key: &str) -> StoreKey {
    StoreKey::new(
        conversation_partition(conversation_id),
        format!("HABIT#{}#{}", subject_id, activity_key),
    )
}

/// Key of a learned alias.
pub fn alias_key(scope_id: &str, alias_key: &str) -> StoreKey {
    StoreKey::new(alias_partition(scope_id), alias_key)
}

/// Key of a conversation's response ledger.
pub fn ledger_key(conversation_id: &str) -> StoreKey {
    StoreKey::new(conversation_partition(conversation_id), "LEDGER")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let key = ema_key("alex", "effort#laundry");
        assert_eq!(key.partition, "SUBJECT#alex");
        assert_eq!(key.sort, "EMA#effort#laundry");

        let key = habit_key("kitchen", "alex", "laundry");
        assert_eq!(key.partition, "CONV#kitchen");
        assert_eq!(key.sort, "HABIT#alex#laundry");

        assert_eq!(alias_key("kitchen", "dishes").partition, "ALIAS#kitchen");
        assert_eq!(ledger_key("kitchen").sort, "LEDGER");
    }
}
