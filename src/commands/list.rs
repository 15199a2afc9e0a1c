//! List commands implementation

use crate::providers;
use gpiblpt_core::binding::OPERATIONS;

/// List all providers enabled at compile time
pub fn list_providers() {
    let providers = providers::available_providers();
    if providers.is_empty() {
        println!("No providers available (recompile with provider features enabled)");
        return;
    }

    println!("Available providers:");
    println!();
    for p in &providers {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        println!("  {:6} - {}{}", p.name, p.description, aliases);
    }
}

/// List the operations a script can call
pub fn list_operations() {
    println!("{:<22} {:>9}", "Operation", "Arguments");
    println!("{}", "-".repeat(32));
    for (name, count) in OPERATIONS {
        println!("{:<22} {:>9}", name, count);
    }
    println!();
    println!("The last argument is always the timeout in milliseconds.");
}
