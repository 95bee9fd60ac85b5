//! Tokenizer for the FTS mirror - uses jieba-rs for Chinese word segmentation / 全文索引分词器
//!
//! Mirror text and query keywords go through the same pipeline so that the
//! SQLite FTS5 `unicode61` tokenizer sees identical word boundaries:
//! - Chinese word segmentation (jieba, search mode) / 中文分词
//! - Lowercase + simplified/traditional folding / 小写与简繁归一
//! - Punctuation-only tokens dropped / 丢弃纯标点

use jieba_rs::Jieba;
use once_cell::sync::Lazy;

/// Global jieba tokenizer instance / 全局 jieba 分词器实例
static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Tokenize text / 对文本进行分词
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = to_simplified(&text.to_lowercase());

    JIEBA
        .cut_for_search(&folded, true)
        .into_iter()
        .map(str::trim)
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

/// Segment text for storage in the FTS mirror / 生成写入镜像表的分词文本
pub fn segment_for_index(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Build an FTS5 MATCH expression for a keyword / 构造 FTS5 MATCH 表达式
///
/// Every token becomes a quoted string, so operators typed by the user are
/// treated as plain text; tokens are ANDed. Returns `None` when the keyword
/// has no indexable token.
pub fn build_match_expression(keyword: &str) -> Option<String> {
    let mut tokens = tokenize(keyword);
    tokens.dedup();
    if tokens.is_empty() {
        return None;
    }

    let terms: Vec<String> = tokens
        .iter()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect();
    Some(terms.join(" AND "))
}

/// Traditional to simplified Chinese (common characters) / 繁体转简体（常用字映射）
pub fn to_simplified(text: &str) -> String {
    text.chars().map(|c| {
        match c {
            '國' => '国', '學' => '学', '書' => '书', '電' => '电', '話' => '话',
            '語' => '语', '說' => '说', '讀' => '读', '寫' => '写', '聽' => '听',
            '見' => '见', '視' => '视', '觀' => '观', '開' => '开', '關' => '关',
            '門' => '门', '間' => '间', '問' => '问', '時' => '时', '當' => '当',
            '會' => '会', '應' => '应', '對' => '对', '為' => '为', '無' => '无',
            '從' => '从', '來' => '来', '後' => '后', '發' => '发', '動' => '动',
            '機' => '机', '車' => '车', '號' => '号', '業' => '业', '產' => '产',
            '員' => '员', '務' => '务', '經' => '经', '濟' => '济', '場' => '场',
            '廠' => '厂', '區' => '区', '縣' => '县', '鄉' => '乡', '鎮' => '镇',
            '東' => '东', '西' => '西', '南' => '南', '北' => '北', '風' => '风',
            '雲' => '云', '雨' => '雨', '雪' => '雪', '長' => '长', '廣' => '广',
            '遠' => '远', '進' => '进', '過' => '过', '還' => '还', '運' => '运',
            '報' => '报', '紙' => '纸', '記' => '记', '誌' => '志', '網' => '网',
            '頁' => '页', '圖' => '图', '畫' => '画', '影' => '影', '聲' => '声',
            '樂' => '乐', '歌' => '歌', '藝' => '艺', '術' => '术', '體' => '体',
            '愛' => '爱', '實' => '实', '現' => '现', '夢' => '梦', '裡' => '里',
            '頭' => '头', '臉' => '脸', '眼' => '眼', '點' => '点', '線' => '线',
            '邊' => '边', '連' => '连', '錢' => '钱', '買' => '买', '賣' => '卖',
            '價' => '价', '質' => '质', '費' => '费', '級' => '级', '類' => '类',
            '種' => '种', '樣' => '样', '數' => '数', '量' => '量', '統' => '统',
            '計' => '计', '設' => '设', '備' => '备', '處' => '处', '辦' => '办',
            '總' => '总', '結' => '结', '組' => '组', '織' => '织', '係' => '系',
            '聯' => '联', '歷' => '历', '史' => '史', '認' => '认', '識' => '识',
            '證' => '证', '據' => '据', '論' => '论', '談' => '谈', '議' => '议',
            '選' => '选', '決' => '决', '權' => '权', '黨' => '党', '軍' => '军',
            '戰' => '战', '鬥' => '斗', '勝' => '胜', '敗' => '败', '條' => '条',
            '規' => '规', '則' => '则', '標' => '标', '準' => '准', '廳' => '厅',
            '館' => '馆', '樓' => '楼', '臺' => '台', '燈' => '灯', '裝' => '装',
            '雜' => '杂', '難' => '难', '專' => '专', '師' => '师', '醫' => '医',
            '藥' => '药', '導' => '导', '養' => '养', '習' => '习', '練' => '练',
            _ => c
        }
    }).collect()
}
