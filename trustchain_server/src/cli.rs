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
    // Secrets (TC_MPESA_PASSKEY, TC_SMS_API_KEY) are never printed
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "TC_HOST",
        "TC_PORT",
        "TC_DATABASE_URL",
        "TC_MAX_DB_CONNECTIONS",
        "TC_MAX_OTP_ATTEMPTS",
        "TC_EVENT_BUFFER_SIZE",
        "TC_HIGH_VALUE_THRESHOLD",
        "TC_INSURANCE_EXPIRY_INTERVAL",
        "TC_DEFAULT_PREMIUM_RATE",
        "TC_MPESA_SHORTCODE",
        "TC_SMS_SENDER_ID",
        "TC_SMS_ENABLED",
        "TC_USE_X_FORWARDED_FOR",
        "TC_USE_FORWARDED",
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
