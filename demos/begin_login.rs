//! Starts a LINE login for one tenant and prints the URL the user agent should be sent to.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use url::Url;
// self
use login_broker::{
	auth::{Secret, TenantId},
	config::{BrokerConfig, IdentitySettings},
	identity::HashParams,
	login::ReqwestLoginOrchestrator,
	provider::ProviderDescriptor,
	session::SessionSettings,
	store::MemoryStore,
	tenant::TenantCredential,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let tenant = TenantCredential {
		id: TenantId::new("tenant-acme")?,
		client_id: "1234567890".into(),
		client_secret: Secret::new("demo-channel-secret"),
		origins: vec!["https://app.acme.example".into()],
		redirect_uris: vec![Url::parse("https://auth.example/callback/acme")?],
	};
	let config = BrokerConfig {
		provider: ProviderDescriptor::line()?,
		default_tenant: tenant.id.clone(),
		tenants: vec![tenant],
		allowed_origins: Vec::new(),
		state_ttl_secs: 600,
		http_timeout_secs: 10,
		identity: IdentitySettings {
			lookup_secret: Secret::new("demo-lookup-secret"),
			pepper: Secret::new("demo-pepper"),
			argon2: HashParams::default(),
		},
		session: SessionSettings {
			signing_key: Secret::new("demo-signing-key"),
			issuer: "login-broker".into(),
			audience: "acme-apps".into(),
			ttl_secs: 3_600,
		},
	};
	let store = Arc::new(MemoryStore::default());
	let orchestrator = ReqwestLoginOrchestrator::from_config_with_reqwest(&config, store.clone())?;
	let begin = orchestrator.begin_login("https://app.acme.example", "", "/dashboard").await?;

	println!("Send your user to {}.", begin.login_url);
	println!(
		"Tenant {} resolved via {}; {} state pending.",
		begin.tenant,
		begin.resolution.as_str(),
		store.pending_states()
	);
	println!("Pass `code` and `state` from the callback to complete_login.");

	Ok(())
}
