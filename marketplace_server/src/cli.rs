use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // MKT_WEBHOOK_TOKEN is deliberately absent
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_WAITED_TIMEOUT_HOURS",
        "MKT_PROCESSED_TIMEOUT_HOURS",
        "MKT_DELIVERED_TIMEOUT_HOURS",
        "MKT_REFUND_SELLER_WINDOW_HOURS",
        "MKT_REFUND_BUYER_WINDOW_HOURS",
        "MKT_SWEEP_INTERVAL_SECS",
        "MKT_SWEEP_BATCH_SIZE",
        "MKT_DISABLE_WEBHOOK_TOKEN_CHECK",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
