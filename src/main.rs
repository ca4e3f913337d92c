use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use sami::{Args, OutputFormat, RunOptions, connect, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let run_result = async {
        let interactive = stdout.is_terminal();
        let options = RunOptions::builder()
            .driver_config(args.driver_config())
            .maybe_log_level(args.log_level())
            .output_format(args.output_format().unwrap_or(if interactive {
                OutputFormat::Pretty
            } else {
                OutputFormat::Json
            }))
            .interactive(interactive)
            .build();
        let (command, target) = args.into_command_and_target()?;
        let transport = connect(&target).await?;

        run(command, &mut stdout, transport, options).await
    }
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
