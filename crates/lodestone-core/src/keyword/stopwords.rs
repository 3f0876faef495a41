// crates/lodestone-core/src/keyword/stopwords.rs
// Static stopword tables for the builtin keyword extractor

use std::collections::HashSet;
use std::sync::OnceLock;

static ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "can't", "could", "couldn't", "did", "didn't", "do",
    "does", "doesn't", "doing", "don't", "down", "during", "each", "else", "ever", "every", "few",
    "for", "from", "further", "get", "got", "had", "hadn't", "has", "hasn't", "have", "haven't",
    "having", "he", "he'd", "he'll", "her", "here", "here's", "hers", "herself", "he's", "him",
    "himself", "his", "how", "however", "how's", "i", "i'd", "if", "i'll", "i'm", "in", "into",
    "is", "isn't", "it", "its", "it's", "itself", "i've", "just", "let's", "like", "may", "me",
    "might", "more", "most", "must", "mustn't", "my", "myself", "no", "nor", "not", "of", "off",
    "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over",
    "own", "same", "shall", "shan't", "she", "she'd", "she'll", "she's", "should", "shouldn't",
    "since", "so", "some", "such", "than", "that", "that's", "the", "their", "theirs", "them",
    "themselves", "then", "there", "there's", "these", "they", "they'd", "they'll", "they're",
    "they've", "this", "those", "through", "to", "too", "under", "until", "up", "upon", "us",
    "very", "was", "wasn't", "we", "we'd", "we'll", "were", "we're", "weren't", "we've", "what",
    "what's", "when", "when's", "where", "where's", "which", "while", "who", "whom", "who's",
    "whose", "why", "why's", "will", "with", "won't", "would", "wouldn't", "yet", "you", "you'd",
    "you'll", "your", "you're", "yours", "yourself", "yourselves", "you've",
];

static CHINESE: &[&str] = &[
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "那",
    "他", "她", "它", "们", "与", "及", "或", "等", "被", "把", "让", "为", "对", "从", "向",
    "于", "而", "且", "但", "因为", "所以", "如果", "这个", "那个", "什么", "怎么", "可以",
];

fn table() -> &'static HashSet<&'static str> {
    static TABLE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    TABLE.get_or_init(|| ENGLISH.iter().chain(CHINESE.iter()).copied().collect())
}

/// Whether a lowercased token is a common word in English or Chinese.
pub fn is_stopword(word: &str) -> bool {
    table().contains(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("because"));
        assert!(!is_stopword("tokenizer"));
    }

    #[test]
    fn test_chinese_stopwords() {
        assert!(is_stopword("的"));
        assert!(is_stopword("没有"));
        assert!(!is_stopword("搜索"));
    }

    #[test]
    fn test_table_sizes() {
        assert!(ENGLISH.len() >= 170, "english table shrank: {}", ENGLISH.len());
        assert!(CHINESE.len() >= 50, "chinese table shrank: {}", CHINESE.len());
    }
}
