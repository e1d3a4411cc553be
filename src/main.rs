fn main() {
    if handle_cli_flags() {
        return;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = postview::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Postview {}", postview::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "Postview - Browse an author's posts and their comments.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n\n{}",
                    postview::app::COMMANDS_HELP
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
