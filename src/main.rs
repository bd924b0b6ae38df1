use anyhow::Result;
use std::env;

use rfid_tag_reader::cli::commands::run_cli;
use rfid_tag_reader::core::driver::default_library_path;
use rfid_tag_reader::core::poller::PollerConfig;
use rfid_tag_reader::gui::app::run_gui;

fn main() -> Result<()> {
    // Check if we have command line arguments (excluding program name)
    let args: Vec<String> = env::args().collect();

    // If no arguments provided or only "--gui" flag, start GUI
    if args.len() == 1 || (args.len() == 2 && args[1] == "--gui") {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        println!("Starting RFID Tag Reader GUI...");
        let config = PollerConfig::new(default_library_path(), "tags.db".into());
        run_gui(config)
    } else {
        // CLI mode - pass arguments to CLI parser
        run_cli()
    }
}

#[cfg(test)]
mod tests {
    use rfid_tag_reader::core::tags::signal_percent;
    use rfid_tag_reader::core::utils::{format_hex, format_hex_spaced};

    #[test]
    fn test_hex_formatting() {
        let bytes = vec![0x01, 0x02, 0x03, 0x0A];
        assert_eq!(format_hex(&bytes), "0102030A");
        assert_eq!(format_hex_spaced(&bytes), "01 02 03 0A");
    }

    #[test]
    fn test_signal_mapping() {
        assert_eq!(signal_percent(0x82), 0.0);
        assert_eq!(signal_percent(0xA0), 100.0);
        assert_eq!(signal_percent(0x10), 0.0);
    }
}
