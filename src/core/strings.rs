//! User-facing text. The audience is Vietnamese-speaking students, so every
//! string shown by the chat and quiz screens lives here.

pub const APP_TITLE: &str = "Python Buddy";
pub const APP_TAGLINE: &str =
    "Trợ giảng AI giúp bạn học lập trình Python. Chọn một chế độ để bắt đầu!";
pub const MODE_CHAT: &str = "Giải thích & Gỡ lỗi";
pub const MODE_QUIZ: &str = "Game Câu Cá";

pub const CHAT_INPUT_HINT: &str = "Nhập câu hỏi hoặc đoạn code Python của bạn...";
pub const ANSWER_INPUT_HINT: &str = "Nhập câu trả lời của bạn...";

pub const TRUE_LABEL: &str = "Đúng";
pub const FALSE_LABEL: &str = "Sai";

pub const LOADING_QUESTION: &str = "Đang tải câu hỏi...";
pub const EVALUATING: &str = "Đang chấm điểm...";
pub const QUESTION_HEADING: &str = "Câu hỏi:";
pub const CORRECT_HEADING: &str = "Chính xác!";
pub const WRONG_HEADING: &str = "Sai rồi!";
pub const CORRECT_ANSWER_LABEL: &str = "Đáp án đúng là:";
pub const NEXT_QUESTION: &str = "Câu tiếp theo";
pub const SUBMIT: &str = "Trả lời";
pub const SCORE_LABEL: &str = "Số cá";

pub const YOU_LABEL: &str = "Bạn";
pub const HISTORY_STARTED: &str = "Bắt đầu lúc";
pub const RETRY_HINT: &str = "Nhấn Enter để thử lại.";
pub const NOT_A_CHOICE: &str = "Hãy chọn một trong các đáp án bên trên.";
pub const SCREEN_COMMANDS: &str = "/back: quay lại, /quit: thoát";
pub const CHAT_COMMANDS: &str = "/history: xem lại, /back: quay lại, /quit: thoát";

pub const PRAISE_CUE: &str = "Bạn giỏi quá!";
pub const CONSOLATION_CUE: &str = "Rất tiếc bạn đã sai rồi";

pub fn chat_failure(error: &str) -> String {
    format!("Xin lỗi, đã có lỗi xảy ra. Vui lòng thử lại. Lỗi: {error}")
}

pub fn question_failure(error: &str) -> String {
    format!("Không thể tải câu hỏi. Vui lòng thử lại. Lỗi: {error}")
}

pub fn evaluation_failure(error: &str) -> String {
    format!("Không thể đánh giá câu trả lời. Vui lòng thử lại. Lỗi: {error}")
}
