use colored::Colorize;

fn main() {
    if let Err(e) = energy_anomaly_cli::run() {
        eprintln!("{} {}", "✗".red(), e);
        std::process::exit(1);
    }
}
