use clap::{Parser, Subcommand};
use pkg_constants::lease::{DEFAULT_TTL_SECS, HEARTBEAT_INTERVAL_DIVISOR};
use pkg_constants::network::DEFAULT_API_ADDR;
use pkg_types::advisor::{SuggestRequest, TtlSuggestion};
use pkg_types::lease::{AcquireRequest, HeartbeatRequest, Lease, ReleaseRequest};
use pkg_types::resource::{CreateResourceRequest, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "leasectl", about = "CLI tool for the leasehold lease server")]
struct Cli {
    /// Server API endpoint
    #[arg(long, default_value = DEFAULT_API_ADDR)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage resources
    Resource {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Acquire, renew, release and inspect leases
    Lease {
        #[command(subcommand)]
        action: LeaseAction,
    },
    /// Ask the advisor for a TTL based on past leases
    Suggest {
        resource_id: Uuid,
        /// TTL to fall back to when there is no history
        #[arg(long)]
        historical_ttl: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ResourceAction {
    /// Register a resource
    Create {
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        identifier: String,
    },
    /// List all resources
    List,
    /// Show one resource
    Get { id: Uuid },
}

#[derive(Subcommand)]
enum LeaseAction {
    /// Acquire (or refresh) a lease
    Acquire {
        resource_id: Uuid,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = DEFAULT_TTL_SECS)]
        ttl: u64,
    },
    /// Release a lease you own
    Release {
        resource_id: Uuid,
        #[arg(long)]
        owner: String,
    },
    /// Send one heartbeat
    Heartbeat {
        resource_id: Uuid,
        #[arg(long)]
        owner: String,
    },
    /// Show the stored lease of a resource
    Get { resource_id: Uuid },
    /// List all leases, newest first
    List,
    /// Acquire, keep heartbeating until Ctrl-C, then release
    Hold {
        resource_id: Uuid,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = DEFAULT_TTL_SECS)]
        ttl: u64,
    },
    /// Fire parallel acquires with distinct owners and check that exactly one wins
    Contend {
        resource_id: Uuid,
        #[arg(long, default_value_t = 50)]
        count: usize,
    },
}

struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    fn new(server: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            base: server.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self.http.get(format!("{}{}", self.base, path)).send().await?;
        decode(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> anyhow::Result<T> {
        let resp = self.raw_post(path, body).await?;
        decode(resp).await
    }

    async fn raw_post<B: Serialize>(&self, path: &str, body: &B) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .http
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await?)
    }
}

/// Turn a non-2xx response into an error carrying the server's error code and message.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    match (body["error"].as_str(), body["message"].as_str()) {
        (Some(code), Some(message)) => anyhow::bail!("{} ({}): {}", status, code, message),
        _ => anyhow::bail!("server returned {}", status),
    }
}

fn print_leases(leases: &[Lease]) {
    println!(
        "{:<38} {:<20} {:<9} {:>6} {:<20} {}",
        "RESOURCE", "OWNER", "STATUS", "TTL", "CREATED", "LAST HEARTBEAT"
    );
    for lease in leases {
        println!(
            "{:<38} {:<20} {:<9} {:>6} {:<20} {}",
            lease.resource_id,
            lease.owner_id,
            lease.status,
            lease.ttl_seconds,
            lease.created_at.format("%Y-%m-%d %H:%M:%S"),
            lease.last_heartbeat.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if leases.is_empty() {
        println!("(no leases)");
    }
}

/// Acquire, then heartbeat every `ttl / HEARTBEAT_INTERVAL_DIVISOR` until
/// `shutdown` completes, then release.
async fn hold_until(
    api: &ApiClient,
    resource_id: Uuid,
    owner: &str,
    ttl: u64,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()> {
    let lease: Lease = api
        .post(
            "/api/locks/acquire",
            &AcquireRequest {
                resource_id,
                owner_id: owner.to_string(),
                ttl_seconds: ttl,
            },
        )
        .await?;
    println!("Holding {} as {} (ttl={}s)", lease.resource_id, owner, ttl);

    let every = Duration::from_secs((ttl / HEARTBEAT_INTERVAL_DIVISOR).max(1));
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    // Polled across passes so a signal during a heartbeat is not lost.
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let beat = HeartbeatRequest {
                    resource_id,
                    owner_id: owner.to_string(),
                };
                match api.post::<_, serde_json::Value>("/api/locks/heartbeat", &beat).await {
                    Ok(_) => info!("Heartbeat sent for {}", resource_id),
                    Err(e) => {
                        // The lease is gone (expired or taken over); nothing left to hold.
                        warn!("Heartbeat failed: {:#}", e);
                        return Err(e);
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }

    let _: serde_json::Value = api
        .post(
            "/api/locks/release",
            &ReleaseRequest {
                resource_id,
                owner_id: owner.to_string(),
            },
        )
        .await?;
    println!("Released {}", resource_id);
    Ok(())
}

async fn contend(api: &ApiClient, resource_id: Uuid, count: usize) -> anyhow::Result<bool> {
    println!("Sending {} parallel acquire requests...", count);
    let attempts = (0..count).map(|i| {
        let owner = format!("owner-{}", i);
        let req = AcquireRequest {
            resource_id,
            owner_id: owner.clone(),
            ttl_seconds: 60,
        };
        async move {
            let status = api
                .raw_post("/api/locks/acquire", &req)
                .await
                .map(|r| r.status());
            (owner, status)
        }
    });
    let results = futures_util::future::join_all(attempts).await;

    let mut winners = Vec::new();
    let mut conflicts = 0;
    let mut errors = 0;
    for (owner, status) in results {
        match status {
            Ok(s) if s == reqwest::StatusCode::OK => winners.push(owner),
            Ok(s) if s == reqwest::StatusCode::CONFLICT => conflicts += 1,
            _ => errors += 1,
        }
    }

    println!("Successful acquisitions: {}", winners.len());
    println!("Conflicts (409):         {}", conflicts);
    println!("Errors:                  {}", errors);
    if let Some(owner) = winners.first() {
        println!("Winning owner:           {}", owner);
    }
    Ok(winners.len() == 1)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let api = ApiClient::new(&cli.server)?;

    match cli.command {
        Commands::Resource { action } => match action {
            ResourceAction::Create { kind, identifier } => {
                let res: Resource = api
                    .post("/api/resources", &CreateResourceRequest { kind, identifier })
                    .await?;
                println!("Created resource {} ({}/{})", res.id, res.kind, res.identifier);
            }
            ResourceAction::List => {
                info!("Querying resources from {}", cli.server);
                let resources: Vec<Resource> = api.get("/api/resources").await?;
                println!("{:<38} {:<20} {}", "ID", "TYPE", "IDENTIFIER");
                for res in &resources {
                    println!("{:<38} {:<20} {}", res.id, res.kind, res.identifier);
                }
                if resources.is_empty() {
                    println!("(no resources registered)");
                }
            }
            ResourceAction::Get { id } => {
                let res: Resource = api.get(&format!("/api/resources/{}", id)).await?;
                println!("{}", serde_json::to_string_pretty(&res)?);
            }
        },
        Commands::Lease { action } => match action {
            LeaseAction::Acquire {
                resource_id,
                owner,
                ttl,
            } => {
                let lease: Lease = api
                    .post(
                        "/api/locks/acquire",
                        &AcquireRequest {
                            resource_id,
                            owner_id: owner,
                            ttl_seconds: ttl,
                        },
                    )
                    .await?;
                println!("{}", serde_json::to_string_pretty(&lease)?);
            }
            LeaseAction::Release { resource_id, owner } => {
                let _: serde_json::Value = api
                    .post(
                        "/api/locks/release",
                        &ReleaseRequest {
                            resource_id,
                            owner_id: owner,
                        },
                    )
                    .await?;
                println!("Released {}", resource_id);
            }
            LeaseAction::Heartbeat { resource_id, owner } => {
                let _: serde_json::Value = api
                    .post(
                        "/api/locks/heartbeat",
                        &HeartbeatRequest {
                            resource_id,
                            owner_id: owner,
                        },
                    )
                    .await?;
                println!("Heartbeat accepted for {}", resource_id);
            }
            LeaseAction::Get { resource_id } => {
                let lease: Lease = api.get(&format!("/api/locks/{}", resource_id)).await?;
                println!("{}", serde_json::to_string_pretty(&lease)?);
            }
            LeaseAction::List => {
                info!("Querying leases from {}", cli.server);
                let leases: Vec<Lease> = api.get("/api/locks").await?;
                print_leases(&leases);
            }
            LeaseAction::Hold {
                resource_id,
                owner,
                ttl,
            } => {
                let ctrl_c = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to install Ctrl-C handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                };
                hold_until(&api, resource_id, &owner, ttl, ctrl_c).await?
            }
            LeaseAction::Contend { resource_id, count } => {
                if !contend(&api, resource_id, count).await? {
                    eprintln!("Expected exactly one successful acquisition");
                    std::process::exit(1);
                }
                println!("Exclusivity held: exactly one acquisition succeeded");
            }
        },
        Commands::Suggest {
            resource_id,
            historical_ttl,
        } => {
            let s: TtlSuggestion = api
                .post(
                    "/api/advisor/suggest",
                    &SuggestRequest {
                        resource_id,
                        historical_ttl,
                    },
                )
                .await?;
            println!("Suggested TTL:  {}s", s.suggested_ttl);
            println!("Anomaly score:  {:.3}", s.anomaly_score);
            println!("Based on:       {} past lease(s)", s.samples);
        }
    }

    Ok(())
}
