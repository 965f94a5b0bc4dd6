use colored::*;

/// 漂亮的终端输出工具，只用于启动和退出时的提示信息
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示信息消息
    pub fn info(message: impl AsRef<str>) {
        println!("{} {}", "ℹ".blue().bold(), message.as_ref());
    }

    /// 显示警告消息
    pub fn warning(message: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow().bold(), message.as_ref());
    }

    /// 显示文件信息
    pub fn file_info(label: impl AsRef<str>, path: impl AsRef<str>) {
        println!("{} {}: {}", "📁".blue().bold(), label.as_ref().bold(), path.as_ref());
    }

    /// 显示分割线
    pub fn separator() {
        println!("{}", "=".repeat(50).bright_black());
    }

    /// 启动横幅
    pub fn startup_banner(version: &str, default_dir: impl AsRef<str>, listen: impl AsRef<str>) {
        Self::separator();
        println!("{}", format!("BBDown Web GUI v{}", version).bold());
        Self::separator();
        Self::info("启动中...");
        Self::file_info("默认下载目录", default_dir);
        Self::success(format!("请访问 http://{}", listen.as_ref()));
        println!("{}", "按 Ctrl+C 退出".bright_black());
        Self::separator();
    }
}
