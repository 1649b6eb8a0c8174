//! Per-field HTML extraction for title and review pages.
//!
//! Every collector here is lenient on its own: page markup varies between
//! titles, so a missing element yields null/empty instead of an error. The
//! strict typed checks live downstream in the ETL transforms.

use crate::table::Record;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};

const TOP_N_ACTORS: usize = 10;

fn sel(selector: &'static str) -> Selector {
    Selector::parse(selector).expect("Invalid selector defined in code")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Collects every raw field of a single title page into one record. Field
/// values stay in their scraped shape (label-anchored blobs, href maps);
/// typing happens in the ETL step.
#[must_use]
pub fn collect_title_details(doc: &Html) -> Record {
    let mut record = Record::new();
    record.insert(
        "original_title".to_string(),
        opt_str(collect_original_title(doc)),
    );
    record.insert("genres".to_string(), collect_genres(doc));
    record.insert("poster_url".to_string(), opt_str(collect_poster_url(doc)));
    record.insert("storyline".to_string(), opt_str(collect_storyline(doc)));
    record.insert("tagline".to_string(), opt_str(collect_tagline(doc)));
    record.insert(
        "certificate".to_string(),
        opt_str(collect_certificate(doc)),
    );
    record.insert("review_summary".to_string(), collect_review_summary(doc));
    record.insert(
        "agg_rating".to_string(),
        opt_str(collect_aggregate_rating(doc)),
    );
    record.insert("actors".to_string(), collect_actors(doc));
    record.insert(
        "imdb_recommendations".to_string(),
        collect_recommendations(doc),
    );
    record.insert("details".to_string(), opt_str(collect_details_summary(doc)));
    record.insert("boxoffice".to_string(), opt_str(collect_boxoffice(doc)));
    record.insert("techspecs".to_string(), opt_str(collect_techspecs(doc)));
    record
}

pub fn collect_original_title(doc: &Html) -> Option<String> {
    doc.select(&sel(r#"h1[data-testid="hero-title-block__title"]"#))
        .next()
        .map(element_text)
}

pub fn collect_poster_url(doc: &Html) -> Option<String> {
    doc.select(&sel(r#"div[data-testid="hero-media__poster"] img"#))
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(ToString::to_string)
}

/// The three review-score spans, keyed for the ETL summary splitter. Missing
/// spans leave their slot null.
pub fn collect_review_summary(doc: &Html) -> Value {
    let keys = ["user_review_num", "critic_review_num", "metascore"];
    let scores: Vec<String> = doc
        .select(&sel("span.score"))
        .map(element_text)
        .collect();

    let mut summary = Record::new();
    for (i, key) in keys.iter().enumerate() {
        summary.insert(
            (*key).to_string(),
            scores.get(i).map_or(Value::Null, |s| json!(s)),
        );
    }
    Value::Object(summary)
}

/// Aggregate rating as one raw string, e.g. `"8.9/1099M"`; the hero block
/// glues the vote count straight onto the `/10`.
pub fn collect_aggregate_rating(doc: &Html) -> Option<String> {
    doc.select(&sel(
        r#"div[data-testid="hero-rating-bar__aggregate-rating"]"#,
    ))
    .next()
    .map(element_text)
    .map(|text| text.replace("IMDb RATING", ""))
    .filter(|text| !text.is_empty())
}

/// Name-to-href map for the top billed cast, in billing order.
pub fn collect_actors(doc: &Html) -> Value {
    let mut actors = Record::new();
    for actor in doc
        .select(&sel(r#"a[data-testid="title-cast-item__actor"]"#))
        .take(TOP_N_ACTORS)
    {
        if let Some(href) = actor.value().attr("href") {
            actors.insert(element_text(actor), json!(href));
        }
    }
    Value::Object(actors)
}

/// Hrefs of the "More like this" poster cards, in page order.
pub fn collect_recommendations(doc: &Html) -> Value {
    let refs: Vec<String> = doc
        .select(&sel(r#"a[class*="ipc-poster-card__title"]"#))
        .filter_map(|a| a.value().attr("href"))
        .map(ToString::to_string)
        .collect();
    json!(refs)
}

pub fn collect_storyline(doc: &Html) -> Option<String> {
    doc.select(&sel("div.ipc-html-content.ipc-html-content--base"))
        .next()
        .map(element_text)
}

/// Raw storyline tagline item, label included; the ETL extractor strips the
/// `Taglines` prefix.
pub fn collect_tagline(doc: &Html) -> Option<String> {
    doc.select(&sel(r#"li[data-testid="storyline-taglines"]"#))
        .next()
        .map(element_text)
}

pub fn collect_certificate(doc: &Html) -> Option<String> {
    doc.select(&sel(r#"li[data-testid="storyline-certificate"]"#))
        .next()
        .map(element_text)
}

pub fn collect_genres(doc: &Html) -> Value {
    let genres: Vec<String> = doc
        .select(&sel(r#"div[data-testid="genres"] a"#))
        .map(|el| element_text(el).trim().to_string())
        .collect();
    if genres.is_empty() {
        Value::Null
    } else {
        json!(genres)
    }
}

/// Concatenates the Details section items, labels included, into the single
/// anchored blob the ETL extractor expects.
pub fn collect_details_summary(doc: &Html) -> Option<String> {
    let testids = [
        "title-details-releasedate",
        "title-details-origin",
        "title-details-officialsites",
        "title-details-languages",
        "title-details-akas",
        "title-details-companies",
        "title-details-filminglocations",
    ];
    collect_anchored_blob(doc, &testids)
}

/// Concatenates the Box office section items into one blob; the trailing
/// `IMDbPro` promo text is part of the real page and acts as the ETL's
/// placeholder token.
pub fn collect_boxoffice(doc: &Html) -> Option<String> {
    let testids = [
        "title-boxoffice-budget",
        "title-boxoffice-grossdomestic",
        "title-boxoffice-openingweekenddomestic",
        "title-boxoffice-cumulativeworldwidegross",
        "title-boxoffice-section",
    ];
    collect_anchored_blob(doc, &testids[..4]).or_else(|| {
        doc.select(&sel(r#"div[data-testid="title-boxoffice-section"]"#))
            .next()
            .map(element_text)
    })
}

pub fn collect_techspecs(doc: &Html) -> Option<String> {
    doc.select(&sel(r#"div[data-testid="title-techspecs-section"]"#))
        .next()
        .map(element_text)
        .or_else(|| {
            doc.select(&sel(r#"li[data-testid="title-techspec_runtime"]"#))
                .next()
                .map(element_text)
        })
}

fn collect_anchored_blob(doc: &Html, testids: &[&str]) -> Option<String> {
    let mut blob = String::new();
    for testid in testids {
        let selector = Selector::parse(&format!(r#"li[data-testid="{testid}"]"#))
            .expect("Invalid selector defined in code");
        if let Some(li) = doc.select(&selector).next() {
            blob.push_str(&element_text(li));
        }
    }
    if blob.is_empty() { None } else { Some(blob) }
}

/// Collects one raw review container into a record.
#[must_use]
pub fn collect_review(title_id: &str, container: ElementRef<'_>) -> Record {
    let mut record = Record::new();
    record.insert("title_id".to_string(), json!(title_id));
    record.insert(
        "text".to_string(),
        opt_str(select_text(container, "div.text.show-more__control")),
    );
    record.insert("rating".to_string(), collect_review_rating(container));
    record.insert(
        "date".to_string(),
        opt_str(select_text(container, "span.review-date")),
    );
    record.insert(
        "title".to_string(),
        opt_str(select_text(container, "a.title")),
    );
    record.insert(
        "author".to_string(),
        opt_str(
            container
                .select(&sel("span.display-name-link a"))
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(ToString::to_string),
        ),
    );
    record.insert(
        "helpfulness".to_string(),
        opt_str(select_text(container, "div.actions.text-muted")),
    );
    record
}

/// The rating span holds a bare number; anything longer means no rating was
/// given and the span holds other text.
fn collect_review_rating(container: ElementRef<'_>) -> Value {
    container
        .select(&sel("span.rating-other-user-rating span"))
        .next()
        .map(element_text)
        .and_then(|text| {
            let text = text.trim().to_string();
            if text.len() > 2 {
                None
            } else {
                text.parse::<i64>().ok()
            }
        })
        .map_or(Value::Null, |rating| json!(rating))
}

/// Total review count from the list header, e.g. `"2,847 Reviews"`.
#[must_use]
pub fn find_reviews_num(doc: &Html) -> u32 {
    doc.select(&sel("div.header div"))
        .next()
        .map(element_text)
        .and_then(|text| {
            text.replace([' ', ','], "")
                .split("Reviews")
                .next()?
                .parse()
                .ok()
        })
        .unwrap_or(0)
}

/// Pagination key of the load-more button; `None` means the last page.
#[must_use]
pub fn pagination_key(doc: &Html) -> Option<String> {
    doc.select(&sel("div.load-more-data[data-key]"))
        .next()
        .and_then(|el| el.value().attr("data-key"))
        .map(ToString::to_string)
}

/// All review containers of one loaded page.
#[must_use]
pub fn collect_page_reviews(doc: &Html, title_id: &str) -> Vec<Record> {
    doc.select(&sel("div.review-container"))
        .map(|container| collect_review(title_id, container))
        .collect()
}

fn select_text(container: ElementRef<'_>, selector: &'static str) -> Option<String> {
    container
        .select(&sel(selector))
        .next()
        .map(element_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn opt_str(value: Option<String>) -> Value {
    value.map_or(Value::Null, |v| json!(v))
}
