//! Single bus operations

use std::time::Duration;

use gpiblpt_core::binding::{Call, Operation, Reply};
use gpiblpt_core::{Address, Gpib, PortIo, ReadOptions};

use crate::cli::Commands;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn addresses(raw: &[u8]) -> Vec<Address> {
    raw.iter().copied().map(Address::new).collect()
}

/// Map a bus subcommand to the operation it performs
///
/// Returns `None` for subcommands that are not a single bus operation.
pub fn operation(command: &Commands) -> Result<Option<Operation>, Box<dyn std::error::Error>> {
    let op = match command {
        Commands::ReadString {
            address,
            max_length,
            eoi,
            terminator,
        } => Operation::ReadString {
            address: Address::new(*address),
            options: ReadOptions {
                max_length: *max_length,
                use_eoi: *eoi,
                terminator: *terminator,
            },
        },
        Commands::WriteString { addresses: a, message } => Operation::WriteString {
            addresses: addresses(a),
            data: gpiblpt_core::binding::unescape(message)
                .map_err(|reason| gpiblpt_core::Error::invalid_argument("writeString", reason))?,
        },
        Commands::GoToLocal { addresses: a } => Operation::GoToLocal(addresses(a)),
        Commands::SelectedDeviceClear { addresses: a } => {
            Operation::SelectedDeviceClear(addresses(a))
        }
        Commands::GroupExecuteTrigger { addresses: a } => {
            Operation::GroupExecuteTrigger(addresses(a))
        }
        Commands::DeviceClear => Operation::DeviceClear,
        Commands::SerialPollEnable => Operation::SerialPollEnable,
        Commands::SerialPoll { address } => Operation::SerialPoll(Address::new(*address)),
        Commands::SerialPollDisable => Operation::SerialPollDisable,
        Commands::ReadSrq => Operation::ReadSrq,
        _ => return Ok(None),
    };
    Ok(Some(op))
}

/// Execute one operation and print its result
pub fn run_operation<P: PortIo>(
    bus: &mut Gpib<P>,
    operation: Operation,
    timeout: Duration,
) -> CmdResult {
    let call = Call { operation, timeout };
    match call.execute(bus)? {
        Reply::None => {}
        reply => println!("{}", reply),
    }
    Ok(())
}

/// Serial poll each device in turn and print its status byte
pub fn run_poll<P: PortIo>(
    bus: &mut Gpib<P>,
    raw: &[u8],
    timeout: Duration,
) -> CmdResult {
    bus.serial_poll_enable(timeout)?;
    let mut result = Ok(());
    for address in addresses(raw) {
        match bus.serial_poll(address, timeout) {
            Ok(status) => println!("{:>2}: {}", address, Reply::Status(status)),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    // Leave poll mode even if a device failed to answer
    let disable = bus.serial_poll_disable(timeout);
    result?;
    disable?;
    Ok(())
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use gpiblpt_core::PortMap;
    use gpiblpt_dummy::{SimBus, SimDevice};

    #[test]
    fn test_subcommand_to_operation() {
        let cmd = Commands::WriteString {
            addresses: vec![3, 4],
            message: r"RUN\n".to_string(),
        };
        assert_eq!(
            operation(&cmd).unwrap(),
            Some(Operation::WriteString {
                addresses: vec![Address::new(3), Address::new(4)],
                data: b"RUN\n".to_vec(),
            })
        );

        let bad = Commands::WriteString {
            addresses: vec![3],
            message: r"\q".to_string(),
        };
        assert!(operation(&bad).is_err());
        assert_eq!(operation(&Commands::ListProviders).unwrap(), None);
    }

    #[test]
    fn test_poll_disables_after_failure() {
        let bus = SimBus::new(PortMap::default()).with_device(SimDevice::new(2).with_status(0x41));
        let mut gpib = Gpib::open(bus, PortMap::default()).unwrap();
        // Device 9 is absent: nobody talks the status byte
        let err = run_poll(&mut gpib, &[2, 9], Duration::from_millis(10)).unwrap_err();
        assert!(err.to_string().contains("waitfor_DAV"));
        assert!(!gpib.io().in_serial_poll());
        assert_eq!(gpib.io().control_raw(), 0x24);
    }
}
