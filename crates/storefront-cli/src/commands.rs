use anyhow::{Context, Result};
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ArgMatches, ColorChoice, Command,
};

/// What the user asked for, resolved from the command line
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Login { email: Option<String> },
    Logout,
    Whoami,
    Register {
        email: String,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    ForgotPassword { email: String },
    ResetPassword { token: String },
    Get { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Globals {
    pub api_url: Option<String>,
    pub keyring: bool,
}

fn email_arg() -> Arg {
    Arg::new("email")
        .short('e')
        .long("email")
        .help("Account email address")
        .env("STOREFRONT_EMAIL")
        .required(true)
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("storefront")
        .about("Storefront session client")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Backend origin, e.g. https://api.shop.example")
                .env("STOREFRONT_API_URL")
                .global(true),
        )
        .arg(
            Arg::new("keyring")
                .long("keyring")
                .help("Keep tokens in the OS keychain instead of the cache directory")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("login")
                .about("Log in and store tokens")
                .arg(email_arg().required(false)),
        )
        .subcommand(Command::new("logout").about("Log out and clear stored tokens"))
        .subcommand(Command::new("whoami").about("Restore the stored session and show the user"))
        .subcommand(
            Command::new("register")
                .about("Create an account")
                .arg(email_arg())
                .arg(Arg::new("first-name").long("first-name").help("First name"))
                .arg(Arg::new("last-name").long("last-name").help("Last name")),
        )
        .subcommand(
            Command::new("forgot-password")
                .about("Request a password reset code")
                .arg(email_arg()),
        )
        .subcommand(
            Command::new("reset-password")
                .about("Set a new password with a reset code")
                .arg(
                    Arg::new("token")
                        .long("token")
                        .help("Reset code from the email")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Send an authenticated GET request and print the JSON body")
                .arg(Arg::new("path").help("API path, e.g. /api/orders").required(true)),
        )
}

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{}", name))
}

pub fn handler(matches: &ArgMatches) -> Result<(Globals, Action)> {
    let globals = Globals {
        api_url: matches.get_one::<String>("api-url").cloned(),
        keyring: matches.get_flag("keyring"),
    };

    let action = match matches.subcommand() {
        Some(("login", sub)) => Action::Login {
            email: sub.get_one::<String>("email").cloned(),
        },
        Some(("logout", _)) => Action::Logout,
        Some(("whoami", _)) => Action::Whoami,
        Some(("register", sub)) => Action::Register {
            email: required(sub, "email")?,
            first_name: sub.get_one::<String>("first-name").cloned(),
            last_name: sub.get_one::<String>("last-name").cloned(),
        },
        Some(("forgot-password", sub)) => Action::ForgotPassword {
            email: required(sub, "email")?,
        },
        Some(("reset-password", sub)) => Action::ResetPassword {
            token: required(sub, "token")?,
        },
        Some(("get", sub)) => Action::Get {
            path: required(sub, "path")?,
        },
        _ => anyhow::bail!("unknown command"),
    };
    Ok((globals, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (Globals, Action) {
        let matches = new().try_get_matches_from(args).unwrap();
        handler(&matches).unwrap()
    }

    #[test]
    fn test_login_with_email() {
        let (globals, action) = parse(&["storefront", "login", "--email", "a@b.com"]);
        assert_eq!(
            action,
            Action::Login {
                email: Some("a@b.com".into())
            }
        );
        assert!(!globals.keyring);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let (globals, action) = parse(&[
            "storefront",
            "get",
            "/api/orders",
            "--keyring",
            "--api-url",
            "https://api.shop.example",
        ]);
        assert_eq!(action, Action::Get { path: "/api/orders".into() });
        assert!(globals.keyring);
        assert_eq!(globals.api_url.as_deref(), Some("https://api.shop.example"));
    }

    #[test]
    fn test_register_optional_names() {
        let (_, action) = parse(&["storefront", "register", "-e", "n@b.com", "--first-name", "Ada"]);
        assert_eq!(
            action,
            Action::Register {
                email: "n@b.com".into(),
                first_name: Some("Ada".into()),
                last_name: None,
            }
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(new().try_get_matches_from(["storefront"]).is_err());
    }
}
