// tests/ingest_normalize.rs
use ai_news_aggregator::ingest::normalize::{
    content_fingerprint, normalize, normalize_event, KeywordFilter, SUMMARY_MAX_CHARS,
};
use ai_news_aggregator::ingest::types::{
    Category, EventType, FetchKind, RawCandidate, RawSchedule, Region, SourceDescriptor,
    SourceFamily,
};
use chrono::{NaiveDate, TimeZone, Utc};

fn source(region: Region, family: SourceFamily, category: Category) -> SourceDescriptor {
    SourceDescriptor {
        name: "Wire".into(),
        endpoint: "https://wire.test/feed".into(),
        region,
        fetch_kind: FetchKind::Feed,
        family,
        category,
        ai_filter: true,
        enabled: true,
        selectors: None,
        counters: Default::default(),
    }
}

fn raw(title: &str, description: &str, link: &str) -> RawCandidate {
    RawCandidate {
        source_name: "Wire".into(),
        title: title.into(),
        description: description.into(),
        link: link.into(),
        published_at: Utc.with_ymd_and_hms(2025, 3, 3, 9, 30, 0).unwrap(),
        schedule: None,
        region: None,
    }
}

#[test]
fn news_fields_are_cleaned_and_defaulted() {
    let src = source(Region::International, SourceFamily::News, Category::Product);
    let item = normalize(
        &raw(
            "  New&nbsp;GPT “Model” Released ",
            "<p>The lab released a <b>new</b> model.</p>",
            " https://example.com/a ",
        ),
        &src,
    );
    assert_eq!(item.title, "New GPT \"Model\" Released");
    assert_eq!(item.summary, "The lab released a new model.");
    assert_eq!(item.body, item.summary);
    assert_eq!(item.link, "https://example.com/a");
    assert_eq!(item.category, Category::Product);
    assert_eq!(item.region, Region::International);
    assert_eq!(item.source, "Wire");
    assert_eq!(item.content_fingerprint, content_fingerprint("https://example.com/a"));
}

#[test]
fn summary_falls_back_to_title_and_is_capped() {
    let src = source(Region::Domestic, SourceFamily::News, Category::Tech);
    let item = normalize(&raw("标题", "", "https://example.cn/1"), &src);
    assert_eq!(item.summary, "标题");

    let long = "模".repeat(800);
    let item = normalize(&raw("t", &long, "https://example.cn/2"), &src);
    assert_eq!(item.summary.chars().count(), SUMMARY_MAX_CHARS);
}

#[test]
fn per_item_region_overrides_source_region() {
    let src = source(Region::International, SourceFamily::News, Category::Tech);
    let mut r = raw("t", "d", "https://example.com/x");
    r.region = Some(Region::Domestic);
    assert_eq!(normalize(&r, &src).region, Region::Domestic);
}

#[test]
fn fingerprint_is_stable_across_tracking_variants() {
    assert_eq!(
        content_fingerprint("https://EXAMPLE.com/b?utm_source=rss&utm_medium=feed"),
        content_fingerprint("https://example.com/b/")
    );
}

#[test]
fn events_need_a_start_date() {
    let src = source(Region::International, SourceFamily::KnownEvents, Category::Event);
    let mut r = raw("AI Expo", "Annual expo", "https://expo.test");
    assert!(normalize_event(&r, &src).is_none(), "no schedule at all");

    r.schedule = Some(RawSchedule {
        start_date: Some("sometime soon".into()),
        end_date: None,
        location: None,
        event_type: None,
    });
    assert!(normalize_event(&r, &src).is_none(), "unparseable start date");
}

#[test]
fn event_defaults_location_and_infers_type() {
    let src = source(Region::Domestic, SourceFamily::ApiEvents, Category::Tech);
    let mut r = raw("LLM Builders Webinar", "", "https://partner.test/webinar");
    r.schedule = Some(RawSchedule {
        start_date: Some("2025/10/01".into()),
        end_date: Some("2025-09-01".into()),
        location: Some("Online webinar".into()),
        event_type: None,
    });
    let ev = normalize_event(&r, &src).unwrap();
    assert_eq!(ev.start_date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
    assert_eq!(ev.end_date, None, "end before start is dropped");
    assert_eq!(ev.event_type, EventType::Online);
    assert_eq!(ev.category, Category::Event);
    assert_eq!(ev.summary, "LLM Builders Webinar");

    r.schedule = Some(RawSchedule {
        start_date: Some("2025-11-20".into()),
        end_date: None,
        location: None,
        event_type: Some("offline".into()),
    });
    let ev = normalize_event(&r, &src).unwrap();
    assert_eq!(ev.location, "TBD");
    assert_eq!(ev.event_type, EventType::Offline);
}

#[test]
fn custom_keywords_drive_the_gate() {
    let f = KeywordFilter::new(&["robotics", "具身智能"]);
    let src = source(Region::International, SourceFamily::News, Category::Tech);
    assert!(f.admits(&src, "Robotics funding round", ""));
    assert!(f.admits(&src, "", "国内具身智能公司融资"));
    assert!(!f.admits(&src, "Roboticsless", ""), "ASCII keywords match whole words");
}
