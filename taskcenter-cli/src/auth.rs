use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};

use crate::state::ensure_taskcenter_home;

/// Env vars checked before auth.json, in order.
const KEY_ENV_VARS: [&str; 2] = ["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthState {
    pub anthropic_api_key: Option<String>,
}

fn auth_path() -> Result<std::path::PathBuf> {
    Ok(ensure_taskcenter_home()?.join("auth.json"))
}

pub fn load_auth() -> Result<AuthState> {
    let p = auth_path()?;
    if !p.exists() {
        return Ok(AuthState::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(serde_json::from_str(&s)?)
}

pub fn save_auth(auth: &AuthState) -> Result<()> {
    let p = auth_path()?;
    let s = serde_json::to_string_pretty(auth)?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// API key from the environment, else from auth.json. `None` means "run unclassified".
pub fn anthropic_api_key() -> Result<Option<String>> {
    for var in KEY_ENV_VARS {
        if let Ok(v) = std::env::var(var) {
            if !v.trim().is_empty() {
                return Ok(Some(v.trim().to_string()));
            }
        }
    }
    Ok(load_auth()?.anthropic_api_key)
}

fn prompt_secret(label: &str) -> Result<String> {
    // Minimal portable secret prompt: just stdin.
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn anthropic_paste_key() -> Result<()> {
    let mut auth = load_auth()?;
    let key = prompt_secret("Paste Anthropic API key (starts with sk-ant-)")?;
    if !key.starts_with("sk-ant-") {
        bail!("key didn't look like an Anthropic key (expected prefix sk-ant-)");
    }
    auth.anthropic_api_key = Some(key);
    save_auth(&auth)?;
    println!("Saved Anthropic API key to {}", auth_path()?.display());
    Ok(())
}
