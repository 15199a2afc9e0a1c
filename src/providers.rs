//! Provider registration and dispatch
//!
//! Providers supply port I/O to the bus. Each one is behind a cargo
//! feature and selected at runtime by a string of the form
//! `name[:key=value,...]`.

use gpiblpt_core::{Gpib, PortIo, PortMap};

/// A bus on whichever provider was selected
pub type Bus = Gpib<Box<dyn PortIo>>;

/// Information about a provider
pub struct ProviderInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all providers enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_providers() -> Vec<ProviderInfo> {
    let mut providers = Vec::new();

    #[cfg(feature = "lpt")]
    providers.push(ProviderInfo {
        name: "lpt",
        aliases: &["port"],
        description: "Parallel port through /dev/port (dev=,base=,data=,status=,control=,ecr=) - requires root",
    });

    #[cfg(feature = "sim")]
    providers.push(ProviderInfo {
        name: "sim",
        aliases: &["dummy"],
        description: "Simulated bus and instruments (config=<file.toml> or addr=,status=,srq=)",
    });

    providers
}

/// Generate help text listing all available providers
pub fn provider_help() -> String {
    let providers = available_providers();

    if providers.is_empty() {
        return "No providers available (recompile with provider features enabled)".to_string();
    }

    let mut help = String::from("Available providers:\n");
    for p in &providers {
        help.push_str(&format!("  {:6} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of provider names for CLI help
pub fn provider_names_short() -> String {
    let providers = available_providers();
    let names: Vec<&str> = providers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the canonical provider name
pub fn find_provider(name: &str) -> Option<&'static str> {
    available_providers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.iter().any(|a| *a == name))
        .map(|p| p.name)
}

/// Parse a provider string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_provider_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the selected provider and bring the bus up
#[allow(unused_variables)]
pub fn open_bus(provider: &str) -> Result<Bus, Box<dyn std::error::Error>> {
    let (name, options) = parse_provider_string(provider);
    let canonical = find_provider(name).ok_or_else(|| unknown_provider_error(name))?;

    let (io, map): (Box<dyn PortIo>, PortMap) = match canonical {
        #[cfg(feature = "lpt")]
        "lpt" => {
            log::info!("Opening parallel port...");
            let (port, map) = gpiblpt_lpt::open_lpt(&options).map_err(|e| {
                format!(
                    "Failed to open parallel port: {}\n\
                     Port I/O needs root (or CAP_SYS_RAWIO) and exclusive use of the port.",
                    e
                )
            })?;
            (Box::new(port) as Box<dyn PortIo>, map)
        }

        #[cfg(feature = "sim")]
        "sim" => {
            let (bus, map) = gpiblpt_dummy::open_sim(&options)?;
            (Box::new(bus) as Box<dyn PortIo>, map)
        }

        _ => return Err(unknown_provider_error(name)),
    };

    Ok(Gpib::open(io, map)?)
}

fn unknown_provider_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown provider: {}\n\n", name);
    msg.push_str(&provider_help());
    msg.push_str("\nUse 'gpiblpt list-providers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_string() {
        assert_eq!(parse_provider_string("lpt"), ("lpt", vec![]));
        assert_eq!(
            parse_provider_string("lpt:base=0x378,dev=/dev/port"),
            ("lpt", vec![("base", "0x378"), ("dev", "/dev/port")])
        );
    }

    #[test]
    fn test_unknown_provider() {
        assert!(find_provider("gpib-usb").is_none());
        assert!(open_bus("gpib-usb").is_err());
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_open_sim_bus() {
        assert_eq!(find_provider("dummy"), Some("sim"));
        let mut bus = open_bus("sim:addr=4").unwrap();
        assert!(!bus.read_srq().unwrap());
    }
}
