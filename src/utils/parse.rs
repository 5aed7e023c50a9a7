use regex::Regex;
use std::collections::BTreeSet;

/// 解析号码列表输入，接受 "12,13,99" 或 "12 13 99"
/// 重复号码按集合语义折叠；任一片段非法则整体判为格式错误
pub fn parse_numbers(text: &str) -> Option<BTreeSet<i64>> {
    let normalized = text.replace(',', " ");
    let parts: Vec<&str> = normalized.split_whitespace().collect();
    if parts.is_empty() {
        return None;
    }

    let mut numbers = BTreeSet::new();
    for part in parts {
        match part.parse::<i64>() {
            Ok(n) if n > 0 => {
                numbers.insert(n);
            }
            _ => return None,
        }
    }
    Some(numbers)
}

/// 解析正整数（数量输入）
pub fn parse_positive_int(text: &str) -> Option<i64> {
    match text.trim().parse::<i64>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    }
}

/// "aleatorio 5" / "random 5" 快捷随机选号
pub fn parse_random_shortcut(text: &str) -> Option<i64> {
    let re = Regex::new(r"^(?:aleatorio|random)\s+(\d+)$").unwrap();
    let binding = text.trim().to_lowercase();
    let caps = re.captures(binding.as_str())?;
    caps.get(1)?.as_str().parse::<i64>().ok().filter(|n| *n > 0)
}

/// 全局命令，在任何状态下优先于状态内分发
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCommand {
    Menu,
    Cancel,
    Help,
}

pub fn parse_global_command(text: &str) -> Option<GlobalCommand> {
    match text.trim().to_lowercase().as_str() {
        "menu" | "start" | "hola" | "inicio" => Some(GlobalCommand::Menu),
        "cancelar" | "cancel" => Some(GlobalCommand::Cancel),
        "ayuda" | "help" => Some(GlobalCommand::Help),
        _ => None,
    }
}

/// CONFIRM_RESERVATION 状态的确认关键字
pub fn is_confirm_keyword(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "confirmar" | "confirm")
}

/// CHOOSE_MODE 状态的选择方式关键字
pub fn parse_mode_keyword(text: &str) -> Option<crate::models::SelectionMode> {
    match text.trim().to_lowercase().as_str() {
        "elegir" | "pick" | "1" => Some(crate::models::SelectionMode::Pick),
        "aleatorio" | "random" | "2" => Some(crate::models::SelectionMode::Random),
        _ => None,
    }
}

/// WAIT_PROOF 状态下跳过上传凭证
pub fn is_skip_keyword(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "saltar" | "skip")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectionMode;

    #[test]
    fn test_parse_numbers_commas_and_spaces() {
        let expected: BTreeSet<i64> = [12, 13, 99].into_iter().collect();
        assert_eq!(parse_numbers("12,13,99"), Some(expected.clone()));
        assert_eq!(parse_numbers("12 13 99"), Some(expected.clone()));
        assert_eq!(parse_numbers(" 12, 13 ,99 "), Some(expected));
    }

    #[test]
    fn test_parse_numbers_collapses_duplicates() {
        let expected: BTreeSet<i64> = [7].into_iter().collect();
        assert_eq!(parse_numbers("7,7,7"), Some(expected));
    }

    #[test]
    fn test_parse_numbers_rejects_garbage() {
        assert_eq!(parse_numbers(""), None);
        assert_eq!(parse_numbers("abc"), None);
        assert_eq!(parse_numbers("1,dos,3"), None);
        assert_eq!(parse_numbers("0"), None);
        assert_eq!(parse_numbers("-5"), None);
    }

    #[test]
    fn test_parse_positive_int() {
        assert_eq!(parse_positive_int(" 5 "), Some(5));
        assert_eq!(parse_positive_int("0"), None);
        assert_eq!(parse_positive_int("cinco"), None);
    }

    #[test]
    fn test_parse_random_shortcut() {
        assert_eq!(parse_random_shortcut("aleatorio 5"), Some(5));
        assert_eq!(parse_random_shortcut("RANDOM 3"), Some(3));
        assert_eq!(parse_random_shortcut("aleatorio"), None);
        assert_eq!(parse_random_shortcut("aleatorio cinco"), None);
        assert_eq!(parse_random_shortcut("5 aleatorio"), None);
    }

    #[test]
    fn test_parse_global_command() {
        assert_eq!(parse_global_command("MENU"), Some(GlobalCommand::Menu));
        assert_eq!(parse_global_command("hola"), Some(GlobalCommand::Menu));
        assert_eq!(parse_global_command("cancelar"), Some(GlobalCommand::Cancel));
        assert_eq!(parse_global_command("ayuda"), Some(GlobalCommand::Help));
        assert_eq!(parse_global_command("confirmar"), None);
        assert_eq!(parse_global_command("5"), None);
    }

    #[test]
    fn test_mode_keywords() {
        assert_eq!(parse_mode_keyword("elegir"), Some(SelectionMode::Pick));
        assert_eq!(parse_mode_keyword("Aleatorio"), Some(SelectionMode::Random));
        assert_eq!(parse_mode_keyword("2"), Some(SelectionMode::Random));
        assert_eq!(parse_mode_keyword("otro"), None);
    }
}
