use ::log::{debug, error};
use rester_runtime::log::init_logging;
use rester_runtime::{Runtime, Settings};

fn main() {
    let settings = match Settings::try_load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };

    init_logging(settings.log_level);

    debug!("Starting rester with {:?}", settings);

    let report = match Runtime::run(&settings) {
        Ok(report) => report,
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    };

    println!("{}", report);

    std::process::exit(report.exit_code());
}
