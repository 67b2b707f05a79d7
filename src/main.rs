use std::{process, sync::Arc, time::Duration};

use scribbly::{
    application::{
        accounts::AccountService,
        error::AppError,
        feed::FeedService,
        follow::FollowService,
        groups::GroupService,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo, SessionsRepo,
            StoreHealth, UsersRepo,
        },
    },
    cache::{CacheConfig, ResponseCache},
    config::{self, Command, GroupsArgs, GroupsCommand, Settings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, CookieSettings, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};
use tokio::{net::TcpListener, signal, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::validation(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Migrate(_) => run_migrate(settings).await,
        Command::Groups(args) => run_groups(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, true).await?;
    let state = build_http_state(repositories, &settings)?;

    match state.accounts.purge_expired_sessions().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "removed expired sessions"),
        Err(err) => warn!(error = %err, "failed to purge expired sessions"),
    }

    serve_http(&settings, state).await
}

async fn run_migrate(settings: Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!("migrations applied");
    Ok(())
}

async fn run_groups(settings: Settings, args: GroupsArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let groups = GroupService::new(groups_repo);

    match args.command {
        GroupsCommand::Create(create) => {
            let group = groups
                .create(&create.slug, &create.title, &create.description)
                .await?;
            println!("created group {} ({})", group.slug, group.title);
        }
        GroupsCommand::List => {
            for group in groups.list().await? {
                println!("{}\t{}", group.slug, group.title);
            }
        }
    }
    Ok(())
}

async fn init_repositories(
    settings: &Settings,
    migrate: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::Connect)?;

    if migrate {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(InfraError::from)?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let health: Arc<dyn StoreHealth> = repositories;

    let session_ttl = time::Duration::try_from(settings.sessions.ttl)
        .map_err(|err| AppError::validation(format!("sessions.ttl_hours: {err}")))?;
    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|err| AppError::validation(format!("uploads.max_request_bytes: {err}")))?;

    let uploads = UploadStorage::new(settings.uploads.directory.clone())
        .map_err(|err| InfraError::io("upload directory", err))?;

    Ok(HttpState {
        feed: Arc::new(FeedService::new(
            posts_repo.clone(),
            comments_repo.clone(),
            groups_repo.clone(),
            users_repo.clone(),
            follows_repo.clone(),
        )),
        posts: Arc::new(PostService::new(
            posts_repo,
            posts_write_repo,
            comments_repo,
            groups_repo,
        )),
        follows: Arc::new(FollowService::new(users_repo.clone(), follows_repo)),
        accounts: Arc::new(AccountService::new(users_repo, sessions_repo, session_ttl)),
        health,
        uploads: Arc::new(uploads),
        cache: Arc::new(ResponseCache::new(&CacheConfig::from(&settings.cache))),
        cookies: CookieSettings {
            secure: settings.sessions.secure_cookie,
            ttl: session_ttl,
        },
        upload_limit_bytes,
    })
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::io("listener", err))?;
    info!(addr = %settings.server.addr, "listening");

    let stopping = Arc::new(Notify::new());
    let trigger = stopping.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.notify_one();
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(stopping, grace) => {
            warn!(grace_secs = grace.as_secs(), "in-flight requests did not finish before the shutdown deadline");
        }
    }

    info!("server stopped");
    Ok(())
}

/// Completes `grace` after shutdown begins.
async fn drain_deadline(stopping: Arc<Notify>, grace: Duration) {
    stopping.notified().await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
