//! Get-id command implementation.

use segdb_core::id_for;

/// Describes the database key that device `n` maps to.
#[must_use]
pub fn run(n: u64) -> String {
    format!("Device with id {n} maps to a database key of {}", id_for(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_both_ids() {
        assert_eq!(
            run(1),
            "Device with id 1 maps to a database key of 73dacfc7-cd3a-2620-8c43-000000000001"
        );
    }
}
