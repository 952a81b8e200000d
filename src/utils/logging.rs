/// 日志工具模块
///
/// 提供流水线各阶段日志输出的辅助函数
use tracing::info;

/// 记录程序启动信息
///
/// # 参数
/// - `model_name`: 目标模型
/// - `endpoint_url`: 批量接口路径
pub fn log_startup(model_name: &str, endpoint_url: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题库打标批量请求生成");
    info!("🤖 目标模型: {} ({})", model_name, endpoint_url);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始
///
/// # 参数
/// - `step`: 当前步骤编号
/// - `total_steps`: 总步骤数
/// - `title`: 步骤说明
pub fn log_stage_start(step: usize, total_steps: usize, title: &str) {
    info!("\n{}", "─".repeat(60));
    info!("📦 [{}/{}] {}", step, total_steps, title);
    info!("{}", "─".repeat(60));
}

/// 记录题库加载信息
pub fn log_bank_loaded(questions: usize, images: usize, chapters: usize) {
    info!(
        "✓ 题库加载完成: {} 道题, {} 张图片, {} 个章节",
        questions, images, chapters
    );
}

/// 流水线最终统计
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub questions_loaded: usize,
    pub questions_formatted: usize,
    pub images_written: usize,
    pub requests_written: usize,
    pub output_path: String,
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &PipelineStats) {
    let finished_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    info!("{}", "=".repeat(60));
    info!("📊 流水线完成 @ {}", finished_at);
    info!(
        "📚 题目: 载入 {} / 格式化 {}",
        stats.questions_loaded, stats.questions_formatted
    );
    info!("🖼️ 图片: {} 张", stats.images_written);
    info!(
        "✅ 请求: {} 条 -> {}",
        stats.requests_written, stats.output_path
    );
    info!("{}", "=".repeat(60));
}

/// 把题干压成单行预览，超过 `max_chars` 个字符时以 `…` 结尾
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
