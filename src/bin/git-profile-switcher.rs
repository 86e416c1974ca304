// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use git_profile_switcher::{
    config::Settings,
    gitconfig::{activate, read_identity, Git2ConfigWriter},
    import::{GhCli, IdentityQuery, IdentitySource},
    path::{absolutize, default_settings_file},
    profile::Profile,
    repo::RepoOverrideWriter,
    store::ProfileRegistry,
};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Text;
use std::{env, fs, io::ErrorKind, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "git-profile-switcher [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub globals: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let globals = self.globals;
        match self.command {
            Command::List => run_list(&globals),
            Command::Status => run_status(&globals),
            Command::Add(opts) => run_add(&globals, opts),
            Command::Edit(opts) => run_edit(&globals, opts),
            Command::Remove(opts) => run_remove(&globals, opts),
            Command::Use(opts) => run_use(&globals, opts),
            Command::Rule(opts) => run_rule(&globals, opts),
            Command::Pin(opts) => run_pin(&globals, opts),
            Command::Unpin(opts) => run_unpin(&globals, opts),
            Command::Import(opts) => run_import(&globals, opts).await,
            Command::Sync => run_sync(&globals),
        }
    }
}

#[derive(Args, Clone, Debug)]
struct GlobalOptions {
    /// Directory holding profiles, active pointer, and companion files.
    #[arg(long, global = true, value_name = "path")]
    pub storage_dir: Option<PathBuf>,

    /// Global Git configuration file to manage.
    #[arg(long, global = true, value_name = "path")]
    pub global_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List registered profiles.
    #[command(override_usage = "git-profile-switcher list [options]")]
    List,

    /// Show active profile and effective global identity.
    #[command(override_usage = "git-profile-switcher status [options]")]
    Status,

    /// Register new profile.
    #[command(override_usage = "git-profile-switcher add [options] <label>")]
    Add(AddOptions),

    /// Change fields of existing profile.
    #[command(override_usage = "git-profile-switcher edit [options] <profile>")]
    Edit(EditOptions),

    /// Remove profiles from registry.
    #[command(override_usage = "git-profile-switcher remove [options] <profile>...")]
    Remove(RemoveOptions),

    /// Activate profile system wide.
    #[command(override_usage = "git-profile-switcher use [options] <profile>")]
    Use(UseOptions),

    /// Manage directory rules of a profile.
    #[command(subcommand)]
    Rule(RuleCommand),

    /// Pin profile to repository.
    #[command(override_usage = "git-profile-switcher pin [options] <profile> [<repo>]")]
    Pin(PinOptions),

    /// Unpin whatever profile is pinned to repository.
    #[command(override_usage = "git-profile-switcher unpin [options] [<repo>]")]
    Unpin(UnpinOptions),

    /// Import profile from GitHub through the GitHub CLI.
    #[command(override_usage = "git-profile-switcher import [options] [<login>]")]
    Import(ImportOptions),

    /// Rewrite managed block and companion files from registry.
    #[command(override_usage = "git-profile-switcher sync [options]")]
    Sync,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Human readable label of profile.
    #[arg(required = true, value_name = "label")]
    pub label: String,

    /// Value for user.name, prompted for if left out.
    #[arg(short, long, value_name = "name")]
    pub name: Option<String>,

    /// Value for user.email, prompted for if left out.
    #[arg(short, long, value_name = "email")]
    pub email: Option<String>,

    /// Private SSH key to use for this profile.
    #[arg(long, value_name = "path")]
    pub ssh_key: Option<String>,

    /// Value for user.signingkey.
    #[arg(long, value_name = "key")]
    pub signing_key: Option<String>,

    /// Value for gpg.format, e.g. ssh or openpgp.
    #[arg(long, value_name = "format")]
    pub signing_format: Option<String>,

    /// Directory whose repositories should use this profile.
    #[arg(short, long = "rule", value_name = "dir")]
    pub rules: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct EditOptions {
    /// Id or label of profile to edit.
    #[arg(required = true, value_name = "profile")]
    pub profile: String,

    /// New label.
    #[arg(long, value_name = "label")]
    pub label: Option<String>,

    /// New value for user.name.
    #[arg(short, long, value_name = "name")]
    pub name: Option<String>,

    /// New value for user.email.
    #[arg(short, long, value_name = "email")]
    pub email: Option<String>,

    /// New SSH key, empty to clear.
    #[arg(long, value_name = "path")]
    pub ssh_key: Option<String>,

    /// New signing key, empty to clear.
    #[arg(long, value_name = "key")]
    pub signing_key: Option<String>,

    /// New signing format, empty to clear.
    #[arg(long, value_name = "format")]
    pub signing_format: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Ids or labels of profiles to remove.
    #[arg(required = true, value_name = "profile")]
    pub profiles: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UseOptions {
    /// Id or label of profile to activate.
    #[arg(group = "target", value_name = "profile")]
    pub profile: Option<String>,

    /// Clear active profile instead.
    #[arg(group = "target", long)]
    pub none: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum RuleCommand {
    /// Add directory rules to profile.
    #[command(override_usage = "git-profile-switcher rule add [options] <profile> <dir>...")]
    Add(RuleOptions),

    /// Remove directory rules from profile.
    #[command(override_usage = "git-profile-switcher rule remove [options] <profile> <dir>...")]
    Remove(RuleOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RuleOptions {
    /// Id or label of profile.
    #[arg(required = true, value_name = "profile")]
    pub profile: String,

    /// Directory prefixes.
    #[arg(required = true, value_name = "dir")]
    pub dirs: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PinOptions {
    /// Id or label of profile to pin.
    #[arg(required = true, value_name = "profile")]
    pub profile: String,

    /// Repository root, current directory if left out.
    #[arg(value_name = "repo")]
    pub repo: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UnpinOptions {
    /// Repository root, current directory if left out.
    #[arg(value_name = "repo")]
    pub repo: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ImportOptions {
    /// GitHub login to import, the logged in account if left out.
    #[arg(value_name = "login")]
    pub login: Option<String>,

    /// Label of new profile, login if left out.
    #[arg(long, value_name = "label")]
    pub label: Option<String>,

    /// Email to use instead of the public one.
    #[arg(short, long, value_name = "email")]
    pub email: Option<String>,

    /// List accounts the GitHub CLI is logged into instead.
    #[arg(long, conflicts_with_all = ["login", "label", "email"])]
    pub accounts: bool,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(globals: &GlobalOptions) -> Result<Settings> {
    let mut settings = match fs::read_to_string(default_settings_file()?) {
        Ok(data) => data.parse::<Settings>()?,
        Err(err) if err.kind() == ErrorKind::NotFound => Settings::default(),
        Err(err) => return Err(err.into()),
    };

    if let Some(path) = &globals.storage_dir {
        settings.storage_dir = Some(path.clone());
    }

    if let Some(path) = &globals.global_config {
        settings.global_config = Some(path.clone());
    }

    Ok(settings)
}

fn open_registry(globals: &GlobalOptions) -> Result<ProfileRegistry> {
    let settings = load_settings(globals)?;
    Ok(ProfileRegistry::open(
        settings.storage_dir()?,
        settings.global_config()?,
    ))
}

fn expand_dir(raw: &str) -> Result<String> {
    Ok(absolutize(raw, env::current_dir()?)?
        .to_string_lossy()
        .into_owned())
}

fn repo_or_cwd(raw: Option<String>) -> Result<PathBuf> {
    let cwd = env::current_dir()?;
    Ok(match raw {
        Some(raw) => absolutize(raw, cwd)?,
        None => cwd,
    })
}

/// Store edited profile, warning if it was deleted out from under us.
fn update_or_warn(registry: &mut ProfileRegistry, profile: Profile) -> bool {
    let label = profile.label.clone();
    let updated = registry.update(profile);
    if !updated {
        warn!("profile {label:?} no longer exists, edit was dropped");
    }

    updated
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn run_list(globals: &GlobalOptions) -> Result<()> {
    let registry = open_registry(globals)?;
    if registry.profiles().is_empty() {
        info!("no profiles registered");
        return Ok(());
    }

    for profile in registry.profiles() {
        let marker = if registry.active_id() == Some(profile.id) { "*" } else { " " };
        println!(
            "{marker} {} {:<16} {} <{}>",
            profile.id, profile.label, profile.display_name, profile.email
        );
        for rule in &profile.directory_rules {
            println!("      rule: {rule}");
        }
        for repo in &profile.repo_overrides {
            println!("      pin:  {repo}");
        }
    }

    Ok(())
}

fn run_status(globals: &GlobalOptions) -> Result<()> {
    let registry = open_registry(globals)?;
    match registry.active() {
        Some(profile) => println!("active profile: {} ({})", profile.label, profile.id),
        None => println!("active profile: none"),
    }

    let global = registry.rules().global_config();
    if global.exists() {
        match read_identity(&Git2ConfigWriter::new(), global)? {
            Some((name, email)) => println!("global identity: {name} <{email}>"),
            None => println!("global identity: unset"),
        }
    } else {
        println!("global identity: unset");
    }
    println!("storage: {}", registry.storage_dir().display());
    println!("global config: {}", global.display());

    Ok(())
}

fn run_add(globals: &GlobalOptions, opts: AddOptions) -> Result<()> {
    let mut registry = open_registry(globals)?;

    let name = match opts.name {
        Some(name) => name,
        None => Text::new("user.name:").prompt()?,
    };
    let email = match opts.email {
        Some(email) => email,
        None => Text::new("user.email:").prompt()?,
    };

    let mut profile = Profile::new(opts.label, name, email);
    profile.ssh_key_path = opts.ssh_key.and_then(non_empty);
    profile.signing_key = opts.signing_key.and_then(non_empty);
    profile.signing_format = opts.signing_format.and_then(non_empty);
    for rule in &opts.rules {
        profile.add_rule(expand_dir(rule)?);
    }

    println!("{}", profile.id);
    registry.add(profile);

    Ok(())
}

fn run_edit(globals: &GlobalOptions, opts: EditOptions) -> Result<()> {
    let mut registry = open_registry(globals)?;
    let mut profile = registry.find(&opts.profile)?.clone();

    if let Some(label) = opts.label {
        profile.label = label;
    }
    if let Some(name) = opts.name {
        profile.display_name = name;
    }
    if let Some(email) = opts.email {
        profile.email = email;
    }
    if let Some(key) = opts.ssh_key {
        profile.ssh_key_path = non_empty(key);
    }
    if let Some(key) = opts.signing_key {
        profile.signing_key = non_empty(key);
    }
    if let Some(format) = opts.signing_format {
        profile.signing_format = non_empty(format);
    }

    update_or_warn(&mut registry, profile);

    Ok(())
}

fn run_remove(globals: &GlobalOptions, opts: RemoveOptions) -> Result<()> {
    let mut registry = open_registry(globals)?;
    for query in opts.profiles {
        let id = registry.find(&query)?.id;
        registry.delete(&id);
    }

    Ok(())
}

fn run_use(globals: &GlobalOptions, opts: UseOptions) -> Result<()> {
    let mut registry = open_registry(globals)?;

    let Some(query) = opts.profile.filter(|_| !opts.none) else {
        registry.set_active(None);
        info!("no profile is active");
        return Ok(());
    };

    let profile = registry.find(&query)?.clone();
    activate(
        &Git2ConfigWriter::new(),
        registry.rules().global_config(),
        &profile,
    )?;
    registry.set_active(Some(profile.id));

    Ok(())
}

fn run_rule(globals: &GlobalOptions, cmd: RuleCommand) -> Result<()> {
    let mut registry = open_registry(globals)?;
    let (opts, adding) = match cmd {
        RuleCommand::Add(opts) => (opts, true),
        RuleCommand::Remove(opts) => (opts, false),
    };

    let mut profile = registry.find(&opts.profile)?.clone();
    let mut changed = false;
    for dir in &opts.dirs {
        let dir = expand_dir(dir)?;
        let done = if adding {
            profile.add_rule(dir.as_str())
        } else {
            profile.remove_rule(dir.as_str())
        };

        if !done {
            warn!("{:?} unchanged for rule {dir:?}", profile.label);
        }
        changed |= done;
    }

    if changed {
        update_or_warn(&mut registry, profile);
    }

    Ok(())
}

fn run_pin(globals: &GlobalOptions, opts: PinOptions) -> Result<()> {
    let mut registry = open_registry(globals)?;
    let repo = repo_or_cwd(opts.repo)?;
    let mut profile = registry.find(&opts.profile)?.clone();

    RepoOverrideWriter::<Git2ConfigWriter>::default().write_override(&repo, &profile)?;
    if profile.add_override(repo.to_string_lossy()) {
        update_or_warn(&mut registry, profile);
    }

    Ok(())
}

fn run_unpin(globals: &GlobalOptions, opts: UnpinOptions) -> Result<()> {
    let mut registry = open_registry(globals)?;
    let repo = repo_or_cwd(opts.repo)?;

    RepoOverrideWriter::<Git2ConfigWriter>::default().remove_override(&repo)?;

    let repo = repo.to_string_lossy().into_owned();
    let pinned = registry
        .profiles()
        .iter()
        .filter(|profile| profile.repo_overrides.iter().any(|known| *known == repo))
        .cloned()
        .collect::<Vec<_>>();
    for mut profile in pinned {
        profile.remove_override(&repo);
        update_or_warn(&mut registry, profile);
    }

    Ok(())
}

async fn run_import(globals: &GlobalOptions, opts: ImportOptions) -> Result<()> {
    let gh = GhCli::discover()?;

    if opts.accounts {
        for account in gh.accounts()? {
            let marker = if account.active { "*" } else { " " };
            println!("{marker} {account}");
        }
        return Ok(());
    }

    let query = match opts.login.as_deref().map(str::trim) {
        Some(login) if !login.is_empty() => IdentityQuery::User(login.to_string()),
        _ => IdentityQuery::Authenticated,
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    bar.set_message("asking GitHub CLI for account details");
    bar.enable_steady_tick(Duration::from_millis(100));
    let fetched = tokio::task::spawn_blocking(move || gh.fetch(&query)).await;
    bar.finish_and_clear();
    let identity = fetched.map_err(|err| anyhow!("identity lookup aborted: {err}"))??;

    let email = match (opts.email, &identity.email) {
        (Some(email), _) => Some(email),
        (None, Some(_)) => None,
        (None, None) => Some(Text::new("user.email:").prompt()?),
    };
    let label = opts.label.unwrap_or_else(|| identity.login.clone());
    let profile = identity.into_profile(label, email)?;

    let mut registry = open_registry(globals)?;
    println!("{}", profile.id);
    registry.add(profile);

    Ok(())
}

fn run_sync(globals: &GlobalOptions) -> Result<()> {
    let registry = open_registry(globals)?;
    registry.resync()?;
    info!("include rules synchronized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn update_of_deleted_profile_is_reported() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut registry =
            ProfileRegistry::open(temp.path().join("store"), temp.path().join("gitconfig"));
        let mut profile = Profile::new("Work", "Bob", "bob@work.com");
        registry.add(profile.clone());

        profile.email = "bob@corp.com".into();
        assert!(update_or_warn(&mut registry, profile.clone()));
        assert_eq!(registry.find("Work")?.email, "bob@corp.com");

        registry.delete(&profile.id);
        assert!(!update_or_warn(&mut registry, profile));
        assert!(registry.profiles().is_empty());

        Ok(())
    }
}
