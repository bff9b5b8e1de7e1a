//! Output formatting utilities.
//!
//! Pretty printing for CLI commands.

use colored::Colorize;
use hdvault_core::{AddressWindow, DuplicateAddressLabel, IllegitimateCache, ReplenishReport};

/// Shorten a long key or address for display.
pub fn format_key_short(key: &str) -> String {
    if key.is_ascii() && key.len() > 24 {
        format!("{}...{}", &key[..12], &key[key.len() - 8..])
    } else {
        key.to_string()
    }
}

/// Print success message.
pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

/// Print error message.
pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

/// Print warning message.
pub fn print_warning(msg: &str) {
    println!("{}", format!("⚠ {}", msg).yellow());
}

/// Print info message.
pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

/// Lines describing a repair run, one per change.
pub fn report_lines(report: &ReplenishReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.hd_wallet_synthesized {
        lines.push("created missing HD wallet".to_string());
    }
    if report.accounts_synthesized > 0 {
        lines.push(format!("created {} default account(s)", report.accounts_synthesized));
    }
    for (account, derivation) in &report.regenerated {
        lines.push(format!("regenerated {} derivation of account {}", derivation, account));
    }
    if report.duplicates_collapsed > 0 {
        lines.push(format!("collapsed {} duplicate derivation(s)", report.duplicates_collapsed));
    }
    if report.labels_carried > 0 {
        lines.push(format!("kept {} address label(s)", report.labels_carried));
    }
    if report.default_account_reset {
        lines.push("reset default account to 0".to_string());
    }
    lines
}

/// Print repair report.
pub fn print_report(report: &ReplenishReport) {
    println!("{}", "Repair Report".bold());
    println!("{}", "=".repeat(50));
    if report.is_unchanged() {
        println!("  {}", "no changes".bright_green());
    }
    for line in report_lines(report) {
        println!("  • {}", line);
    }
}

/// Print illegitimate address caches.
pub fn print_illegitimate(caches: &[IllegitimateCache]) {
    if caches.is_empty() {
        print_success("All address caches match their account keys");
        return;
    }
    for cache in caches {
        print_warning(&format!(
            "account {} {} cache does not match its account key",
            cache.account_index, cache.derivation_type
        ));
    }
}

pub fn label_warnings(duplicates: &[DuplicateAddressLabel]) -> Vec<String> {
    duplicates
        .iter()
        .map(|duplicate| {
            format!(
                "account {} {} has more than one label on receive index {}",
                duplicate.account_index, duplicate.derivation_type, duplicate.label_index
            )
        })
        .collect()
}

/// Print derivations with duplicate address label indices.
pub fn print_duplicate_labels(duplicates: &[DuplicateAddressLabel]) {
    for line in label_warnings(duplicates) {
        print_warning(&line);
    }
}

/// Print lookahead windows.
pub fn print_windows(windows: &[AddressWindow]) {
    for window in windows {
        println!(
            "{} {} ({}, from index {})",
            "Account".bold(),
            window.account_index.to_string().bright_green(),
            window.derivation_type,
            window.receive_index.to_string().bright_yellow()
        );
        for (offset, address) in window.addresses.iter().enumerate() {
            println!(
                "  {:>4}  {}",
                window.receive_index as usize + offset,
                address.bright_cyan()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdvault_types::DerivationType;

    #[test]
    fn test_format_key_short() {
        let xpub = "xpub6CatWdiZiodmUeTDp8LT5or8nmbKNcuyvz7WyksVFkKB4RHwCD3XyuvPEbvqAQY3rAPshWcMLoP2fMFMKHPJ4ZeZXYVUhLv1VMrjPC7PW6V";
        assert_eq!(format_key_short(xpub), "xpub6CatWdiZ...jPC7PW6V");
        assert_eq!(format_key_short("1Short"), "1Short");
    }

    #[test]
    fn test_report_lines() {
        let report = ReplenishReport {
            regenerated: vec![(0, DerivationType::Segwit)],
            labels_carried: 2,
            ..Default::default()
        };
        assert_eq!(
            report_lines(&report),
            vec![
                "regenerated segwit derivation of account 0".to_string(),
                "kept 2 address label(s)".to_string(),
            ]
        );
        assert!(report_lines(&ReplenishReport::default()).is_empty());
    }

    #[test]
    fn test_label_warnings() {
        let duplicates = [DuplicateAddressLabel {
            account_index: 1,
            derivation_type: DerivationType::Legacy,
            label_index: 4,
        }];
        assert_eq!(
            label_warnings(&duplicates),
            vec!["account 1 legacy has more than one label on receive index 4".to_string()]
        );
    }
}
