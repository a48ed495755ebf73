use std::process::ExitCode;

fn main() -> ExitCode {
    match cropswag_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("cropswag: {e}");
            ExitCode::FAILURE
        }
    }
}
