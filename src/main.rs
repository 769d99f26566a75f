use std::process;

use clap::Parser;

use feature_freezer::Args;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            process::exit(code);
        }
    };

    if let Err(err) = feature_freezer::run(&args) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
