use anyhow::{Context, Result};
use qb_labeler::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置：命令行给出 TOML 路径时读取文件，环境变量始终可以覆盖
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_toml_file(&path)
            .with_context(|| format!("加载配置文件失败: {}", path))?
            .with_env_overrides(),
        None => Config::from_env(),
    };

    // 初始化并运行应用
    App::new(config).run().await?;

    Ok(())
}
