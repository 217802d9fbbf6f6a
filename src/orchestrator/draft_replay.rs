//! 草稿补交 - 编排层
//!
//! ## 职责
//!
//! 本模块是补交程序的入口，负责资源装配和草稿调度。
//!
//! 1. **应用初始化**：日志文件、持久化存储、采集客户端、计时器入口
//! 2. **计时器恢复**：按持久化状态恢复三类计时器（含离线补偿）
//! 3. **草稿补交**：逐个提交待补交草稿，成功后删除文件
//! 4. **全局统计**：汇总补交结果
//!
//! 同一考生的页面必须按顺序上报，所以草稿逐个提交，不做并发。

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{CollectorClient, MarkTransport};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{Clock, FileStore, KeyValueStore, SystemClock};
use crate::models::{load_all_drafts, PageDraft};
use crate::timers::{TimerDurations, TimerKind, TimerRegistry};
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::utils::truncate_text;
use crate::workflow::{PageSubmission, SubmissionOptions, SubmitOverrides};

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn MarkTransport>,
    timers: TimerRegistry,
}

/// 补交统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    /// 会话过期后未尝试的草稿数
    pub skipped: usize,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;

        let (store, transport) = Self::open_resources(&config)?;

        log_startup(&config.collector_url(), config.dev_mode);

        Ok(Self::with_parts(config, store, transport, Arc::new(SystemClock)))
    }

    /// 打开持久化存储并构建采集客户端
    fn open_resources(
        config: &Config,
    ) -> AppResult<(Arc<dyn KeyValueStore>, Arc<dyn MarkTransport>)> {
        let store = FileStore::open(&config.storage_path)?;
        let transport = CollectorClient::new(config)?;
        Ok((Arc::new(store), Arc::new(transport)))
    }

    /// 使用给定的存储、传输和时钟装配应用
    pub fn with_parts(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn MarkTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let timers = TimerRegistry::new(store.clone(), clock)
            .with_durations(TimerDurations::from_config(&config));

        Self {
            config,
            store,
            transport,
            timers,
        }
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ReplayStats> {
        self.restore_timers();

        let drafts = self.load_drafts().await?;
        if drafts.is_empty() {
            warn!("⚠️ 没有找到待补交的草稿，程序结束");
            self.timers.stop_all();
            return Ok(ReplayStats::default());
        }

        info!("✓ 找到 {} 个待补交的草稿", drafts.len());

        let stats = self.replay_all(drafts).await;
        self.timers.stop_all();

        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    fn restore_timers(&self) {
        for kind in TimerKind::ALL {
            let info = self.timers.get(kind).debug_info();
            info!(
                "⏱  {} 计时器: {:?}, 剩余 {}/{}s, scope {}",
                kind, info.phase, info.remaining, info.duration, info.scope
            );
        }
    }

    async fn load_drafts(&self) -> Result<Vec<PageDraft>> {
        info!("\n📁 正在扫描待补交的草稿...");
        if !std::path::Path::new(&self.config.pending_folder).exists() {
            warn!("草稿目录不存在: {}", self.config.pending_folder);
            return Ok(Vec::new());
        }
        load_all_drafts(&self.config.pending_folder).await
    }

    async fn replay_all(&self, drafts: Vec<PageDraft>) -> ReplayStats {
        let mut stats = ReplayStats {
            total: drafts.len(),
            ..Default::default()
        };

        for (index, draft) in drafts.iter().enumerate() {
            info!("\n{}", "─".repeat(60));
            info!(
                "📄 [{}/{}] {}",
                index + 1,
                stats.total,
                truncate_text(&draft.label(), 60)
            );

            let submission = self.submission_for(draft);
            if submission.submit(self.overrides_for(draft)).await {
                stats.success += 1;
                self.remove_draft(draft).await;
                continue;
            }

            stats.failed += 1;
            if submission
                .last_error()
                .is_some_and(|e| e.is_session_expired())
            {
                stats.skipped = stats.total - index - 1;
                error!("❌ 会话已过期，剩余 {} 个草稿不再尝试", stats.skipped);
                break;
            }
        }

        stats
    }

    fn submission_for(&self, draft: &PageDraft) -> PageSubmission {
        let label = draft.label();

        let options = SubmissionOptions::from_config(
            &self.config,
            self.transport.clone(),
            self.store.clone(),
        )
        .user_context(draft.context())
        .on_error(move |e| warn!("[{}] 提交失败: {}", label, e));

        PageSubmission::new(options)
    }

    fn overrides_for(&self, draft: &PageDraft) -> SubmitOverrides {
        SubmitOverrides {
            mark: Some(draft.mark.clone()),
            user_context: None,
            flow_context: draft.flow.clone(),
        }
    }

    async fn remove_draft(&self, draft: &PageDraft) {
        let Some(path) = &draft.file_path else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!("🗑  已删除草稿: {}", path.display()),
            Err(e) => warn!("删除草稿失败 {}: {}", path.display(), e),
        }
    }
}
