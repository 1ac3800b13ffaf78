use serde_json::json;

use crate::auth::{password::hash_password, ExtraClaims, TokenService};
use crate::cli::OutputFormat;
use crate::config;

pub fn issue(user_id: i32, tenant: Option<String>, super_admin: bool, format: OutputFormat) -> anyhow::Result<()> {
    let tokens = TokenService::from_config(&config::config().security)?;
    let extra = ExtraClaims {
        tenant,
        super_admin: super_admin.then_some(true),
    };
    let token = tokens.issue(user_id, &extra)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "access_token": token,
                "expires_in": tokens.session_length().num_seconds(),
                "tenant": extra.tenant,
            })
        ),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}

pub fn hash(password: &str, format: OutputFormat) -> anyhow::Result<()> {
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    let hashed = hash_password(password)?;

    match format {
        OutputFormat::Json => println!("{}", json!({ "hashed_password": hashed })),
        OutputFormat::Text => println!("{}", hashed),
    }
    Ok(())
}
