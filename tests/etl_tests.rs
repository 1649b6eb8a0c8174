//! End-to-end ETL tests: raw index file in, normalized CSV tables out.

use filmarr::error::EtlError;
use filmarr::etl::{MetadataEtl, ReviewsEtl, fanout};
use filmarr::storage::Storage;
use filmarr::table::{Record, Table};
use serde_json::{Value, json};
use std::path::PathBuf;

fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("filmarr-etl-test-{}", uuid::Uuid::new_v4()))
}

fn raw_title_row(title_id: &str) -> Record {
    let mut row = Record::new();
    row.insert("title_id".to_string(), json!(title_id));
    row.insert("agg_rating".to_string(), json!("9.0/102.8M"));
    row.insert(
        "review_summary".to_string(),
        json!({
            "user_review_num": "7.7KUser reviews",
            "critic_review_num": "432Critic reviews",
            "metascore": "84Metascore"
        }),
    );
    row.insert(
        "original_title".to_string(),
        json!("Original title: The Dark Knight"),
    );
    row.insert("tagline".to_string(), json!("TaglinesWhy So Serious?"));
    row.insert(
        "details".to_string(),
        json!(
            "Release dateJuly 18, 2008 (United States)Countries of origin\
             United StatesUnited KingdomOfficial sitesOfficial Facebook\
             Production companiesWarner Bros.SyncopySee more"
        ),
    );
    row.insert(
        "boxoffice".to_string(),
        json!(
            "Budget$185,000,000 (estimated)Gross US & Canada$534,987,076\
             Opening weekend US & Canada$158,074,286Jul 20, 2008\
             Gross worldwide$1,005,973,645See detailed box office info on IMDbPro"
        ),
    );
    row.insert(
        "techspecs".to_string(),
        json!("Runtime2 hours 32 minutesSound mixDolby DigitalColorColor"),
    );
    row.insert(
        "actors".to_string(),
        json!({
            "Christian Bale": "/name/nm0000288/?ref_=tt_ov_st_1",
            "Heath Ledger": "/name/nm0005132/?ref_=tt_ov_st_2"
        }),
    );
    row.insert(
        "imdb_recommendations".to_string(),
        json!(["/title/tt1375666/?ref_=tt_sims_tt_t_1", "/title/tt0137523/?ref_=tt_sims_tt_t_2"]),
    );
    row
}

#[test]
fn metadata_pipeline_normalizes_one_full_title() {
    let raw = Table::from_rows(vec![raw_title_row("/title/tt0468569/")]);

    let transformed = MetadataEtl::pipeline().compose(raw).unwrap();
    let row = &transformed.rows()[0];

    assert!((row["rating"].as_f64().unwrap() - 9.0).abs() < 1e-9);
    assert!((row["total_votes"].as_f64().unwrap() - 2_800_000.0).abs() < 1.0);
    assert!((row["user_reviews_num"].as_f64().unwrap() - 7_700.0).abs() < f64::EPSILON);
    assert_eq!(row["original_title"], json!("The Dark Knight"));
    assert_eq!(row["tagline"], json!("Why So Serious?"));
    assert_eq!(row["release_date"], json!("2008-07-18"));
    assert_eq!(row["budget"], json!("$185,000,000"));
    assert_eq!(row["boxoffice"], json!("$1,005,973,645"));
    assert_eq!(row["runtime_min"], json!(152));

    let tables = fanout::normalize(transformed).unwrap();
    assert_eq!(tables.main.len(), 1);
    assert!(!tables.main.has_column("actors"));
    assert!(!tables.main.has_column("imdb_recommendations"));

    assert_eq!(tables.actors.len(), 2);
    let actor = &tables.actors.rows()[0];
    assert_eq!(actor["actor_id"], json!("/name/nm0000288/"));
    assert_eq!(actor["order_num"], json!(1));

    assert_eq!(tables.recommendations.len(), 2);
    let rec = &tables.recommendations.rows()[1];
    assert_eq!(rec["suggested_title_id"], json!("/title/tt0137523/"));
    assert_eq!(rec["order_num"], json!(2));

    assert_eq!(tables.countries.len(), 2);
    assert_eq!(tables.countries.rows()[1]["country"], json!("United Kingdom"));
    assert_eq!(tables.companies.len(), 2);
    assert_eq!(tables.companies.rows()[0]["order_num"], json!(1));
}

#[test]
fn metadata_pipeline_accepts_scraped_title_pages() {
    // Feed the pipeline a record built by the page collectors themselves, so
    // the scraped column set and the transforms' required columns stay in
    // lockstep.
    let page = scraper::Html::parse_document(
        r#"
        <html><body>
        <h1 data-testid="hero-title-block__title">The Dark Knight</h1>
        <div data-testid="genres"><a>Action</a><a>Crime</a></div>
        <div data-testid="hero-rating-bar__aggregate-rating">
            <span>IMDb RATING</span><span>8.9/10</span><span>99M</span>
        </div>
        <span class="score">7.7KUser reviews</span>
        <span class="score">432Critic reviews</span>
        <span class="score">84Metascore</span>
        <div class="ipc-html-content ipc-html-content--base">The Joker wreaks havoc on Gotham.</div>
        <ul>
        <li data-testid="storyline-taglines">TaglinesWhy So Serious?</li>
        <li data-testid="storyline-certificate">CertificatePG-13</li>
        </ul>
        <a data-testid="title-cast-item__actor" href="/name/nm0000288?ref_=tt_cl_t_1">Christian Bale</a>
        <a data-testid="title-cast-item__actor" href="/name/nm0005132?ref_=tt_cl_t_2">Heath Ledger</a>
        <a class="ipc-poster-card__title" href="/title/tt1345836/?ref_=tt_sims_tt_t_1">Rises</a>
        <ul>
        <li data-testid="title-details-releasedate">Release dateJuly 18, 2008 (United States)</li>
        <li data-testid="title-details-origin">Countries of originUnited StatesUnited Kingdom</li>
        <li data-testid="title-boxoffice-budget">Budget$185,000,000 (estimated)</li>
        <li data-testid="title-boxoffice-grossdomestic">Gross US &amp; Canada$534,987,076</li>
        <li data-testid="title-boxoffice-openingweekenddomestic">Opening weekend US &amp; Canada$158,074,286Jul 20, 2008</li>
        <li data-testid="title-boxoffice-cumulativeworldwidegross">Gross worldwide$1,005,973,645See detailed box office info on IMDbPro</li>
        </ul>
        <div data-testid="title-techspecs-section">Runtime2 hours 32 minutesSound mixDolby</div>
        </body></html>
        "#,
    );
    let mut scraped = filmarr::scrape::page::collect_title_details(&page);
    scraped.insert("title_id".to_string(), json!("/title/tt0468569/"));

    let raw = Table::from_rows(vec![scraped]);
    let transformed = MetadataEtl::pipeline().compose(raw).unwrap();
    let row = &transformed.rows()[0];

    assert!((row["rating"].as_f64().unwrap() - 8.9).abs() < 1e-4);
    assert_eq!(row["tagline"], json!("Why So Serious?"));
    assert_eq!(row["certificate"], json!("CertificatePG-13"));
    assert_eq!(row["release_date"], json!("2008-07-18"));
    assert_eq!(row["budget"], json!("$185,000,000"));
    assert_eq!(row["boxoffice"], json!("$1,005,973,645"));
    assert_eq!(row["runtime_min"], json!(152));

    let tables = fanout::normalize(transformed).unwrap();
    assert_eq!(tables.main.len(), 1);
    assert_eq!(tables.actors.len(), 2);
    assert_eq!(tables.recommendations.len(), 1);
}

#[test]
fn metadata_pipeline_is_not_idempotent() {
    let raw = Table::from_rows(vec![raw_title_row("/title/tt0468569/")]);
    let transformed = MetadataEtl::pipeline().compose(raw).unwrap();

    // The first step consumed its source column, so a re-run must fail
    // structurally rather than silently pass data through.
    let err = MetadataEtl::pipeline().compose(transformed).unwrap_err();
    assert!(matches!(err, EtlError::MissingColumn(col) if col == "agg_rating"));
}

#[test]
fn metadata_etl_writes_all_five_tables() {
    let data_dir = temp_data_dir();
    let storage = Storage::new(&data_dir, "movie_metadata.json");

    let mut index = serde_json::Map::new();
    let mut fields = raw_title_row("/title/tt0468569/");
    fields.remove("title_id");
    index.insert("/title/tt0468569/".to_string(), Value::Object(fields));
    storage.write_metadata_index(&index).unwrap();

    MetadataEtl::new(storage.clone()).run().unwrap();

    let out = storage.output_dir();
    for name in [
        "main.csv",
        "imdb_recommendations.csv",
        "actors.csv",
        "country_of_origin.csv",
        "production_company.csv",
    ] {
        assert!(out.join(name).exists(), "missing {name}");
    }

    let main = storage.read_csv(&out.join("main.csv")).unwrap();
    assert_eq!(main.len(), 1);
    assert_eq!(main.rows()[0]["title_id"], json!("/title/tt0468569/"));

    std::fs::remove_dir_all(&data_dir).unwrap();
}

fn raw_review_row(title_id: &str) -> Record {
    let mut row = Record::new();
    row.insert("title_id".to_string(), json!(title_id));
    row.insert("helpfulness".to_string(), json!("1,710 out of 1,850 found this helpful"));
    row.insert("author".to_string(), json!("/user/ur1234567/?ref_=tt_urv"));
    row.insert("title".to_string(), json!("A masterpiece\n"));
    row.insert("date".to_string(), json!("31 January 2020"));
    row.insert("rating".to_string(), json!("10"));
    row.insert("text".to_string(), json!("Best movie of the decade."));
    row
}

#[test]
fn reviews_pipeline_normalizes_raw_rows() {
    let raw = Table::from_rows(vec![raw_review_row("/title/tt0468569/")]);
    let out = ReviewsEtl::pipeline().compose(raw).unwrap();

    let row = &out.rows()[0];
    assert_eq!(row["upvotes"], json!(1710));
    assert_eq!(row["total_votes"], json!(1850));
    assert_eq!(row["author"], json!("/user/ur1234567/"));
    assert_eq!(row["title"], json!("A masterpiece"));
    assert!(!row.contains_key("date"));
    assert_eq!(row["review_date"], json!("2020-01-31"));
}

#[test]
fn reviews_etl_concatenates_per_title_files() {
    let data_dir = temp_data_dir();
    let storage = Storage::new(&data_dir, "movie_metadata.json");

    for (file, title_id) in [
        ("tt0468569.csv", "/title/tt0468569/"),
        ("tt1375666.csv", "/title/tt1375666/"),
    ] {
        let table = Table::from_rows(vec![raw_review_row(title_id)]);
        storage
            .write_csv(&storage.reviews_dir(), file, &table)
            .unwrap();
    }

    ReviewsEtl::new(storage.clone()).run().unwrap();

    let reviews = storage
        .read_csv(&storage.output_dir().join("reviews.csv"))
        .unwrap();
    assert_eq!(reviews.len(), 2);
    assert!(reviews.has_column("review_date"));
    assert!(!reviews.has_column("date"));

    std::fs::remove_dir_all(&data_dir).unwrap();
}
