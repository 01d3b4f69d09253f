//! # SendFlow Dispatcher
//!
//! 予約・定期キャンペーンの配信を担うバックグラウンドワーカー。
//!
//! ## 役割
//!
//! - **ポーリング**: 一定間隔で配信時刻の到来したキャンペーンを検索する
//! - **配信**: キャンバスからメール本文を生成し、宛先へ逐次送信する
//! - **クレジット管理**: 送信数を付与クレジット → 基本枠の順に引き落とす
//! - **監査**: 配信結果ごとに監査ログを 1 件追記する
//!
//! ## デプロイ制約
//!
//! ポーラーは **1 プロセスのみ** で動かすこと。複数レプリカを並べると
//! 二重送信・二重引き落としが起きる。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `POLL_INTERVAL_SECS` | No | ポーリング間隔（デフォルト: 60） |
//! | `DUE_LOOKBACK_SECS` | No | 予約配信の遡り猶予（デフォルト: 120） |
//! | `SEND_DELAY_MS` | No | 宛先間の送信ディレイ（デフォルト: 200） |
//! | `MAILER_BACKEND` | No | `smtp` \| `noop`（デフォルト: noop） |
//! | `SMTP_HOST` / `SMTP_PORT` | No | SMTP 接続先（デフォルト: localhost:1025） |
//! | `MAILER_FROM_ADDRESS` | No | フォールバック差出人アドレス |
//! | `MAILER_POSTAL_ADDRESS` | No | フッターに表示する物理住所 |
//!
//! ## 起動方法
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo run -p sendflow-dispatcher
//! ```

use std::{sync::Arc, time::Duration};

use sendflow_dispatcher::{
    config::DispatcherConfig,
    renderer::CanvasRenderer,
    scheduler::SchedulerContext,
    usecase::{CampaignProcessor, process::ProcessorDeps},
};
use sendflow_domain::clock::SystemClock;
use sendflow_infra::{
    db,
    mailer::{CampaignMailer, NoopCampaignMailer, SmtpCampaignMailer},
    repository::{
        PostgresAuditLogRepository,
        PostgresCampaignRepository,
        PostgresContactRepository,
        PostgresCreditRepository,
    },
};
use sendflow_shared::observability::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    init_tracing(TracingConfig::from_env("dispatcher"));

    // 設定読み込み
    let config = DispatcherConfig::from_env();
    tracing::info!(
        poll_interval_secs = config.poll_interval_secs,
        mailer_backend = %config.mailer.backend,
        "ディスパッチャを起動します"
    );

    // データベース接続プールを作成し、マイグレーションを適用
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("データベースに接続しました");

    // メール送信バックエンドを選択
    let mailer: Arc<dyn CampaignMailer> = match config.mailer.backend.as_str() {
        "smtp" => Arc::new(SmtpCampaignMailer::new(
            &config.mailer.smtp_host,
            config.mailer.smtp_port,
        )),
        "noop" => Arc::new(NoopCampaignMailer),
        other => anyhow::bail!("未知の MAILER_BACKEND です: {other}"),
    };

    // 依存コンポーネントを初期化
    let campaign_repo = Arc::new(PostgresCampaignRepository::new(pool.clone()));
    let clock = Arc::new(SystemClock);

    let processor = CampaignProcessor::new(
        ProcessorDeps {
            campaign_repo:  campaign_repo.clone(),
            credit_repo:    Arc::new(PostgresCreditRepository::new(pool.clone())),
            audit_log_repo: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
            contact_repo:   Arc::new(PostgresContactRepository::new(pool.clone())),
            mailer,
            clock:          clock.clone(),
        },
        CanvasRenderer::new()?,
        Duration::from_millis(config.send_delay_ms),
        config.mailer.from_address.clone(),
        config.mailer.postal_address.clone(),
    );

    let scheduler = SchedulerContext::new(
        campaign_repo,
        processor,
        clock,
        Duration::from_secs(config.poll_interval_secs),
        chrono::Duration::seconds(config.due_lookback_secs),
    );

    tracing::info!("ポーリングを開始します");
    scheduler.run().await;

    Ok(())
}
