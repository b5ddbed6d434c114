use std::process::ExitCode;

fn main() -> ExitCode {
    match fred_macro_report::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
