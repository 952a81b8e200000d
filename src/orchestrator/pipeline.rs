//! 流水线编排
//!
//! 依次执行：
//! 1. 读取原始题库（元数据 + 图片目录）
//! 2. 格式化图片并保存为新题库
//! 3. 重新读取新题库，校验所有图片引用
//! 4. 构建批量请求并写出 JSONL
//!
//! 任何阶段失败都会中止后续阶段，已写出的前序结果保留不动。

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::infrastructure::LocalStore;
use crate::logger::TracingLogger;
use crate::services::{BatchRequestMaker, DataFormatter};
use crate::utils::logging::{
    log_bank_loaded, log_stage_start, log_startup, print_final_stats, PipelineStats,
};

const TOTAL_STAGES: usize = 4;

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行完整流水线，返回统计信息
    pub async fn run(&self) -> Result<PipelineStats> {
        let config = &self.config;
        log_startup(&config.model_name, &config.endpoint_url);

        // 配置先全部校验，避免跑到一半才发现错误
        let data_format = config.data_format().context("数据格式配置无效")?;
        let prompt = config.prompt().await.context("提示词配置无效")?;

        log_stage_start(1, TOTAL_STAGES, "读取原始题库");
        let raw_store = LocalStore::new(&config.raw_metadata_path, &config.raw_img_dir);
        let raw_bank = raw_store.load().await.with_context(|| {
            format!(
                "读取原始题库失败: {}",
                config.raw_metadata_path.display()
            )
        })?;
        log_bank_loaded(
            raw_bank.question_count(),
            raw_bank.image_count(),
            raw_bank.chapters().len(),
        );

        log_stage_start(2, TOTAL_STAGES, "格式化题库图片");
        let formatter = DataFormatter::new(data_format).with_failure_policy(config.failure_policy);
        let formatted = formatter
            .format_data(&raw_bank, &config.formatted_img_dir)
            .await
            .context("格式化题库失败")?;
        let formatted_store =
            LocalStore::new(&config.formatted_metadata_path, &config.formatted_img_dir);
        formatted_store
            .save(&formatted)
            .await
            .context("保存格式化题库失败")?;

        log_stage_start(3, TOTAL_STAGES, "校验格式化题库");
        let bank = formatted_store
            .load()
            .await
            .context("重新读取格式化题库失败")?;
        log_bank_loaded(
            bank.question_count(),
            bank.image_count(),
            bank.chapters().len(),
        );

        log_stage_start(4, TOTAL_STAGES, "构建批量请求");
        let maker = BatchRequestMaker::new(
            &bank,
            prompt,
            &config.endpoint_url,
            &config.model_name,
            Arc::new(TracingLogger),
        )
        .with_custom_id_prefix(&config.custom_id_prefix)
        .with_failure_policy(config.failure_policy);
        let batch = maker
            .make_batch_request()
            .await
            .context("构建批量请求失败")?;
        batch
            .to_jsonl_file(&config.output_jsonl_path)
            .await
            .context("写出批量请求文件失败")?;
        info!("💾 已写出 {} 条请求", batch.len());

        let stats = PipelineStats {
            questions_loaded: raw_bank.question_count(),
            questions_formatted: bank.question_count(),
            images_written: bank.image_count(),
            requests_written: batch.len(),
            output_path: config.output_jsonl_path.display().to_string(),
        };
        print_final_stats(&stats);
        Ok(stats)
    }
}
