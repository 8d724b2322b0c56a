use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use live_connect::auth::token::{Clock, SystemClock};
use live_connect::config::Endpoints;
use live_connect::logging::truncate_safe;
use live_connect::{AuthOutcome, FileStore, LiveConnect, ProviderConfig, TracingLogger};

/// Live Connect CLI - autorização OAuth2 e acesso a perfil e contatos
#[derive(Parser)]
#[command(name = "live-connect")]
#[command(version)]
#[command(about = "CLI para autenticação e acesso às APIs do Live Connect", long_about = None)]
struct Cli {
    /// Arquivo onde os tokens são guardados
    #[arg(long, env = "LIVE_TOKEN_FILE", global = true)]
    token_file: Option<PathBuf>,

    /// URL base da API REST
    #[arg(long, env = "LIVE_API_BASE_URL", global = true)]
    api_url: Option<String>,

    /// Formato de saída (json, pretty)
    #[arg(short = 'o', long, default_value = "pretty", global = true)]
    output: OutputFormat,

    /// Modo verbose para debug
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Comando a executar
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, PartialEq)]
enum OutputFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(format!("Formato desconhecido: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Mostra a URL de autorização
    AuthUrl {
        /// Abre a URL no navegador
        #[arg(long)]
        open: bool,
    },

    /// Troca o authorization code recebido no redirect por tokens
    Login {
        /// Valor do parâmetro `code` do redirect
        #[arg(short = 'c', long)]
        code: String,
    },

    /// Renova o access token agora
    Refresh,

    /// Mostra o estado dos tokens guardados
    Status,

    /// Obtém o perfil do usuário
    Profile {
        /// ID do usuário (padrão: me)
        #[arg(long)]
        id: Option<String>,
    },

    /// Lista os contatos do usuário
    Contacts {
        /// ID do usuário (padrão: me)
        #[arg(long)]
        id: Option<String>,

        /// Parâmetro extra da query string (formato: chave=valor)
        /// Exemplo: --param limit=10 --param offset=20
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },

    /// Apaga os tokens guardados
    Logout,
}

/// Estrutura para resposta padronizada
#[derive(serde::Serialize)]
struct CliResponse {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
}

impl CliResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

#[tokio::main]
async fn main() {
    // Variáveis do .env também alimentam os `env = ...` do clap
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Configura logging
    let default_filter = if cli.verbose {
        "live_connect=debug"
    } else {
        "live_connect=error"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let output_format = cli.output.clone();

    match execute_command(&cli).await {
        Ok(response) => {
            let exit_code = if response.success { 0 } else { 1 };
            output_response(response, &output_format);
            std::process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("❌ Erro: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn build_client(cli: &Cli) -> anyhow::Result<(LiveConnect, FileStore)> {
    let config = ProviderConfig::from_env().context("Configuração do Live Connect inválida")?;

    let mut store = FileStore::new();
    if let Some(path) = &cli.token_file {
        store = store.with_path(path.clone());
    }

    let mut endpoints = Endpoints::default();
    if let Some(api_url) = &cli.api_url {
        endpoints = endpoints.with_api_base(api_url.as_str());
    }

    let live = LiveConnect::new(config, Arc::new(TracingLogger))
        .with_store(Arc::new(store.clone()))
        .with_endpoints(endpoints);

    Ok((live, store))
}

async fn execute_command(cli: &Cli) -> anyhow::Result<CliResponse> {
    let (live, store) = build_client(cli)?;

    match &cli.command {
        Commands::AuthUrl { open } => {
            let url = live.authorization_url();

            if *open {
                if let Err(e) = webbrowser::open(&url) {
                    eprintln!("⚠️ Não foi possível abrir o navegador: {}", e);
                }
            }

            Ok(CliResponse::success(json!({
                "authorization_url": url,
                "redirect_uri": live.config().redirect_url,
                "next": "Após autorizar, rode `live-connect login --code <code>`"
            })))
        }

        Commands::Login { code } => {
            if live.stored_tokens()?.is_some() {
                eprintln!("ℹ️ Já existem tokens guardados; o code será ignorado. Use `logout` antes para trocar de conta.");
            }

            let outcome = live.authenticate(Some(code.as_str())).await;
            outcome_response(&live, outcome, "Autenticação concluída com sucesso!")
        }

        Commands::Refresh => {
            let outcome = live.force_refresh().await;
            outcome_response(&live, outcome, "Token renovado com sucesso!")
        }

        Commands::Status => {
            let now = SystemClock.now();

            match live.stored_tokens()? {
                Some(record) => Ok(CliResponse::success(json!({
                    "authenticated": record.is_valid_at(now),
                    "expires_at": record.expires_at,
                    "expires_at_utc": record.expires_at_utc().map(|d| d.to_rfc3339()),
                    "seconds_until_expiry": record.seconds_until_expiry(now),
                    "token_preview": format!("{}...", truncate_safe(&record.access_token, 8)),
                    "token_file": store.path().display().to_string(),
                }))),
                None => Ok(CliResponse::success(json!({
                    "authenticated": false,
                    "token_file": store.path().display().to_string(),
                    "message": "Nenhum token guardado. Rode `live-connect auth-url`"
                }))),
            }
        }

        Commands::Profile { id } => match live.get_profile(id.as_deref()).await {
            Ok(profile) => Ok(CliResponse::success(profile)),
            Err(e) => Ok(CliResponse::error(e.to_string())),
        },

        Commands::Contacts { id, params } => {
            let pairs = parse_params(params)?;

            match live.get_contacts(id.as_deref(), &pairs).await {
                Ok(contacts) => Ok(CliResponse::success(contacts)),
                Err(e) => Ok(CliResponse::error(e.to_string())),
            }
        }

        Commands::Logout => {
            live.sign_out()?;
            Ok(CliResponse::success(json!({
                "message": "Tokens removidos",
                "token_file": store.path().display().to_string(),
            })))
        }
    }
}

fn outcome_response(live: &LiveConnect, outcome: AuthOutcome, message: &str) -> anyhow::Result<CliResponse> {
    match outcome {
        AuthOutcome::Authenticated => {
            let expires_at = live
                .stored_tokens()?
                .and_then(|record| record.expires_at_utc())
                .map(|d| d.to_rfc3339());

            Ok(CliResponse::success(json!({
                "message": message,
                "expires_at": expires_at,
            })))
        }
        AuthOutcome::RedirectRequired { url } => Ok(CliResponse::error(format!(
            "Autorização necessária. Abra: {}",
            url
        ))),
        AuthOutcome::Failed(e) => Ok(CliResponse::error(e.to_string())),
    }
}

fn parse_params(params: &[String]) -> anyhow::Result<Vec<(&str, &str)>> {
    params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| anyhow!("Parâmetro inválido: {}. Use chave=valor", param))
        })
        .collect()
}

fn output_response(response: CliResponse, format: &OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(&response) {
            Ok(raw) => println!("{}", raw),
            Err(e) => eprintln!("❌ Erro ao serializar resposta: {}", e),
        },
        OutputFormat::Pretty => {
            if response.success {
                if let Some(data) = response.data {
                    println!("✅ Sucesso!");
                    match serde_json::to_string_pretty(&data) {
                        Ok(raw) => println!("{}", raw),
                        Err(_) => println!("{}", data),
                    }
                }
            } else if let Some(error) = response.error {
                eprintln!("❌ Erro: {}", error);
            }
        }
    }
}
