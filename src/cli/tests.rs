use super::*;
use crate::cli::chat::write_history;
use crate::cli::quiz::resolve_choice;
use crate::core::message::Message;
use crate::core::quiz::AnswerInput;
use crate::utils::test_utils::{RecordingAnnouncer, ScriptedModelClient, ScriptedStream};
use chrono::{Local, TimeZone};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    /// Drive the app with scripted stdin and return everything printed.
    pub(super) async fn run_with_input(
        first: Option<Commands>,
        client: &Arc<ScriptedModelClient>,
        announcer: &Arc<RecordingAnnouncer>,
        input: &str,
    ) -> String {
        let mut lines = BufReader::new(input.as_bytes()).lines();
        let mut out = Vec::new();
        run_app(first, client.clone(), announcer.clone(), &mut lines, &mut out)
            .await
            .expect("app should run to completion");
        String::from_utf8(out).expect("output is utf-8")
    }
}

use test_helpers::{parse_args, run_with_input};

#[test]
fn subcommand_is_optional() {
    let args = parse_args(&["pybuddy"]);
    assert!(args.command.is_none());
    assert!(!args.verbose);

    let args = parse_args(&["pybuddy", "quiz"]);
    assert_eq!(args.command, Some(Commands::Quiz));
}

#[test]
fn global_flags_parse_after_subcommand() {
    let argv = [
        "pybuddy",
        "chat",
        "--chat-model",
        "gemini-2.5-pro",
        "--base-url",
        "http://localhost:8080/v1",
        "-l",
        "pybuddy.log",
        "-v",
    ];
    let args = parse_args(&argv);

    assert_eq!(args.command, Some(Commands::Chat));
    assert_eq!(args.chat_model.as_deref(), Some("gemini-2.5-pro"));
    assert_eq!(args.base_url.as_deref(), Some("http://localhost:8080/v1"));
    assert_eq!(args.log, Some(PathBuf::from("pybuddy.log")));
    assert!(args.verbose);
    assert!(args.quiz_model.is_none());
}

#[test]
fn flags_override_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "chat_model = \"from-file\"\nquiz_model = \"quiz-from-file\"\n",
    )
    .unwrap();
    let path_arg = path.to_string_lossy().to_string();

    let args = parse_args(&["pybuddy", "--config", &path_arg, "--chat-model", "from-flag"]);
    let config = load_config(&args).expect("config loads");

    assert_eq!(config.chat_model(), "from-flag");
    assert_eq!(config.quiz_model(), "quiz-from-file");
}

#[test]
fn broken_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "chat_model = [").unwrap();
    let path_arg = path.to_string_lossy().to_string();

    let args = parse_args(&["pybuddy", "--config", &path_arg]);
    assert!(load_config(&args).is_err());
}

#[test]
fn screen_commands_are_recognised() {
    assert_eq!(parse_screen_command(" /back "), Some(ScreenCommand::Back));
    assert_eq!(parse_screen_command("/quit"), Some(ScreenCommand::Quit));
    assert_eq!(parse_screen_command("/history"), Some(ScreenCommand::History));
    assert_eq!(parse_screen_command("/backup"), None);
    assert_eq!(parse_screen_command("print('/quit')"), None);
}

#[test]
fn numbered_picks_map_to_choices() {
    let shape = AnswerInput::Choices(vec!["int".into(), "float".into()]);
    assert_eq!(resolve_choice("2", &shape), "float");
    assert_eq!(resolve_choice(" 1 ", &shape), "int");
    assert_eq!(resolve_choice("3", &shape), "3");
    assert_eq!(resolve_choice("0", &shape), "0");
    assert_eq!(resolve_choice("float", &shape), "float");
    assert_eq!(resolve_choice("1", &AnswerInput::FreeText), "1");
}

#[test]
fn numeric_choices_match_literally_before_position() {
    let shape = AnswerInput::Choices(vec!["2".into(), "3".into(), "4".into(), "5".into()]);
    assert_eq!(resolve_choice("3", &shape), "3");
    assert_eq!(resolve_choice(" 5 ", &shape), "5");
    assert_eq!(resolve_choice("1", &shape), "2");
}

#[test]
fn history_frames_code_blocks() {
    let transcript = vec![
        Message::user("Sửa giúp mình"),
        Message::assistant("Thử thế này:\n\n```python\nx = 5\nprint(x)\n```\n"),
    ];
    let started_at = Local.with_ymd_and_hms(2026, 10, 18, 9, 5, 0).single().unwrap();
    let mut out = Vec::new();
    write_history(&mut out, Some(started_at), &transcript).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("\n(Bắt đầu lúc 09:05)\n"));
    assert!(text.contains("Bạn:\nSửa giúp mình"));
    assert!(text.contains("Python Buddy:\nThử thế này:"));
    assert!(text.contains("┌─ python\n│ x = 5\n│ print(x)\n└─"));
}

#[tokio::test]
async fn chat_screen_streams_reply_and_reprints_history() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    client.push_stream(ScriptedStream::fragments(&["Biến là ", "một cái tên."]));

    let output = run_with_input(
        Some(Commands::Chat),
        &client,
        &announcer,
        "Biến là gì?\n\n/history\n/quit\n",
    )
    .await;

    assert!(output.contains("Python Buddy: Biến là một cái tên.\n"));
    assert!(output.contains("Bạn:\nBiến là gì?"));
    assert!(output.contains("(Bắt đầu lúc "));
    assert_eq!(client.chat_requests().len(), 1);
}

#[tokio::test]
async fn chat_screen_shows_fallback_on_failure() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    client.push_stream(ScriptedStream::OpenError(
        crate::core::model_client::ModelError::transport("offline"),
    ));

    let output = run_with_input(Some(Commands::Chat), &client, &announcer, "hi\n/quit\n").await;

    assert!(output.contains("Xin lỗi, đã có lỗi xảy ra. Vui lòng thử lại. Lỗi: offline"));
}

#[tokio::test]
async fn quiz_screen_plays_a_true_false_round() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    client.push_structured(Ok(json!({
        "type": "true_false",
        "question": "Python phân biệt chữ hoa và chữ thường.",
        "answer": "Đúng"
    })));
    client.push_structured(Ok(json!({
        "is_correct": true,
        "explanation": "Đúng vậy, `Name` và `name` là hai biến khác nhau."
    })));

    let output = run_with_input(Some(Commands::Quiz), &client, &announcer, "1\n/quit\n").await;

    assert!(output.contains("Python phân biệt chữ hoa và chữ thường."));
    assert!(output.contains("  1. Đúng\n  2. Sai\n"));
    assert!(output.contains("Chính xác!"));
    assert!(output.contains("Đáp án đúng là: Đúng"));
    assert!(output.contains("🐟 Số cá: 1"));
    assert_eq!(announcer.spoken(), vec!["Bạn giỏi quá!".to_string()]);
}

#[tokio::test]
async fn quiz_screen_submits_numeric_option_as_typed() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    client.push_structured(Ok(json!({
        "type": "mcq",
        "question": "len('abc') trả về gì?",
        "options": ["2", "3", "4", "5"],
        "answer": "3"
    })));
    client.push_structured(Ok(json!({
        "is_correct": true,
        "explanation": "Chuỗi 'abc' có ba ký tự."
    })));

    let output = run_with_input(Some(Commands::Quiz), &client, &announcer, "3\n/quit\n").await;

    let requests = client.structured_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].prompt.contains("Câu trả lời của tôi là: \"3\""));
    assert!(output.contains("🐟 Số cá: 1"));
}

#[tokio::test]
async fn quiz_screen_retries_failed_fetch_on_enter() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    client.push_structured(Err(crate::core::model_client::ModelError::transport("503")));
    client.push_structured(Ok(json!({
        "type": "flashcard",
        "question": "Vòng lặp là gì?",
        "answer": "Lặp lại một khối lệnh"
    })));

    let output = run_with_input(Some(Commands::Quiz), &client, &announcer, "\n/quit\n").await;

    assert!(output.contains("Không thể tải câu hỏi. Vui lòng thử lại. Lỗi: 503"));
    assert!(output.contains("Vòng lặp là gì?"));
    assert_eq!(client.structured_requests().len(), 2);
}

#[tokio::test]
async fn menu_routes_to_screens_until_quit() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    client.push_structured(Ok(json!({
        "type": "fill_in_the_blank",
        "question": "Hàm ___ đọc dữ liệu từ bàn phím.",
        "answer": "input"
    })));

    let output = run_with_input(None, &client, &announcer, "x\n2\n/back\n/quit\n").await;

    assert!(output.contains("1. Giải thích & Gỡ lỗi"));
    assert!(output.contains("== Game Câu Cá =="));
    assert_eq!(output.matches("🐍 Python Buddy").count(), 2);
}

#[tokio::test]
async fn menu_exits_at_end_of_input() {
    let client = ScriptedModelClient::new();
    let announcer = RecordingAnnouncer::new();
    let output = run_with_input(None, &client, &announcer, "").await;
    assert!(output.contains("Python Buddy"));
}
