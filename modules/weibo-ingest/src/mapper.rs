//! RawItem → EnrichedDocument.

use weibo_common::{EnrichedDocument, RawItem};

/// Build the persisted document from a crawler record plus the normalized
/// timestamp and sentiment score computed upstream. Absent strings become "",
/// absent counters 0.
pub fn build_document(raw: &RawItem, created_at: String, score: f64) -> EnrichedDocument {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();

    EnrichedDocument {
        id: raw.id.clone(),
        bid: text(&raw.bid),
        user_id: text(&raw.user_id),
        screen_name: text(&raw.screen_name),
        text: text(&raw.text),
        article_url: text(&raw.article_url),
        location: text(&raw.location),
        at_users: text(&raw.at_users),
        topics: split_topics(raw.topics.as_deref().unwrap_or_default()),
        reposts_count: raw.reposts_count.unwrap_or(0),
        comments_count: raw.comments_count.unwrap_or(0),
        attitudes_count: raw.attitudes_count.unwrap_or(0),
        created_at,
        source: text(&raw.source),
        pics_url: join_pics(raw.pics.as_deref().unwrap_or_default()),
        video_url: text(&raw.video_url),
        retweet_id: text(&raw.retweet_id),
        ip: text(&raw.ip),
        user_authentication: text(&raw.user_authentication),
        score,
        keyword: text(&raw.keyword),
    }
}

/// Split a comma-joined topic string. Fragments are trimmed, empty ones
/// dropped; order and repeats are kept.
pub fn split_topics(topics: &str) -> Vec<String> {
    topics
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}

/// Flatten picture URLs into one comma-joined field. One way only: URLs that
/// themselves contain commas cannot be told apart afterwards.
pub fn join_pics(pics: &[String]) -> String {
    pics.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_trimmed_and_empties_dropped() {
        assert_eq!(split_topics("a, b ,,c"), vec!["a", "b", "c"]);
        assert_eq!(split_topics(" , ,"), Vec::<String>::new());
        assert_eq!(split_topics(""), Vec::<String>::new());
    }

    #[test]
    fn topics_keep_order_and_repeats() {
        assert_eq!(split_topics("c,a,c"), vec!["c", "a", "c"]);
    }

    #[test]
    fn pics_are_comma_joined() {
        assert_eq!(join_pics(&["u1".to_string(), "u2".to_string()]), "u1,u2");
        assert_eq!(join_pics(&[]), "");
    }

    #[test]
    fn absent_fields_take_defaults() {
        let doc = build_document(&RawItem::new("1"), "1970-01-01 00:00:00".into(), 5.0);

        assert_eq!(doc.id, "1");
        assert_eq!(doc.bid, "");
        assert_eq!(doc.text, "");
        assert!(doc.topics.is_empty());
        assert_eq!(doc.reposts_count, 0);
        assert_eq!(doc.comments_count, 0);
        assert_eq!(doc.attitudes_count, 0);
        assert_eq!(doc.pics_url, "");
        assert_eq!(doc.keyword, "");
        assert_eq!(doc.score, 5.0);
    }

    #[test]
    fn present_fields_are_carried_over() {
        let raw = RawItem {
            bid: Some("NzY8qB3xP".into()),
            user_id: Some("1669879400".into()),
            screen_name: Some("迪丽热巴".into()),
            text: Some("新的一天".into()),
            topics: Some("春天, 生活".into()),
            reposts_count: Some(12),
            comments_count: Some(34),
            attitudes_count: Some(5600),
            created_at: Some("ignored here".into()),
            pics: Some(vec!["https://wx1.sinaimg.cn/a.jpg".into()]),
            retweet_id: Some("498".into()),
            ip: Some("上海".into()),
            keyword: Some("春天".into()),
            ..RawItem::new("4981234567890123")
        };

        let doc = build_document(&raw, "2024-05-01 12:30:00".into(), 8.0);

        assert_eq!(doc.id, "4981234567890123");
        assert_eq!(doc.bid, "NzY8qB3xP");
        assert_eq!(doc.screen_name, "迪丽热巴");
        assert_eq!(doc.topics, vec!["春天", "生活"]);
        assert_eq!(doc.reposts_count, 12);
        assert_eq!(doc.attitudes_count, 5600);
        assert_eq!(doc.created_at, "2024-05-01 12:30:00");
        assert_eq!(doc.pics_url, "https://wx1.sinaimg.cn/a.jpg");
        assert_eq!(doc.ip, "上海");
        assert_eq!(doc.score, 8.0);
        assert_eq!(doc.keyword, "春天");
    }

    #[test]
    fn document_serializes_with_index_field_names() {
        let doc = build_document(&RawItem::new("1"), "2024-05-01 12:30:00".into(), 5.0);
        let json = serde_json::to_value(&doc).unwrap();

        for field in [
            "id", "bid", "user_id", "screen_name", "text", "article_url", "location",
            "at_users", "topics", "reposts_count", "comments_count", "attitudes_count",
            "created_at", "source", "pics_url", "video_url", "retweet_id", "ip",
            "user_authentication", "score", "keyword",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json.as_object().unwrap().len(), 21);
    }
}
