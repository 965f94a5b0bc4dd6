use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 按优先级排列，先匹配到的生效
    static ref URL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)https?://\S+").unwrap(), // 完整URL
        Regex::new(r"(?i)b23\.tv/\S+").unwrap(),  // 短链接
        Regex::new(r"(?i)BV[a-zA-Z0-9]+").unwrap(), // BV号
        Regex::new(r"(?i)av\d+").unwrap(),        // av号
        Regex::new(r"(?i)ep\d+").unwrap(),        // 番剧ep
        Regex::new(r"(?i)ss\d+").unwrap(),        // 番剧ss
    ];
}

/// 从用户粘贴的分享文本中提取B站链接或视频ID。
///
/// 没有匹配到任何模式时返回去掉首尾空白的原文本。
pub fn extract_url(text: &str) -> String {
    let text = text.trim();

    for pattern in URL_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            let url = m.as_str();
            // 没有协议头的短链接补上 https
            if url.to_ascii_lowercase().starts_with("b23.tv") {
                return format!("https://{}", url);
            }
            return url.to_string();
        }
    }

    text.to_string()
}
