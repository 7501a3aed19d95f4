//! Shared fixtures for the integration tests

#![allow(dead_code)]

use polars::prelude::*;
use salary_predictor::config::AppConfig;
use serde_json::{json, Value};
use std::path::Path;

const EDUCATION: [&str; 4] = ["Bachelor", "High School", "Master", "PhD"];
const SIZES: [&str; 3] = ["Large", "Medium", "Small"];
const EMPLOYMENT: [&str; 2] = ["Contract", "Full-time"];
const TITLES: [&str; 3] = ["Data Analyst", "Data Scientist", "ML Engineer"];

/// Deterministic synthetic salary table with `n` distinct rows.
pub fn salary_frame(n: usize) -> DataFrame {
    let mut experience = Vec::with_capacity(n);
    let mut education = Vec::with_capacity(n);
    let mut remote = Vec::with_capacity(n);
    let mut size = Vec::with_capacity(n);
    let mut employment = Vec::with_capacity(n);
    let mut work_year = Vec::with_capacity(n);
    let mut title = Vec::with_capacity(n);
    let mut salary = Vec::with_capacity(n);

    for i in 0..n {
        let exp = (i % 20) as f64 + (i / 20) as f64 * 0.5;
        let edu = i % EDUCATION.len();
        let sz = (i / 2) % SIZES.len();
        let emp = (i / 3) % EMPLOYMENT.len();
        let ratio = [0i64, 50, 100][i % 3];
        let year = 2020 + (i % 4) as i64;

        let pay = 40_000.0
            + 4_500.0 * exp
            + 6_000.0 * edu as f64
            + 8_000.0 * (SIZES.len() - sz) as f64
            + 3_000.0 * emp as f64
            + 40.0 * ratio as f64
            + ((i * 37) % 11) as f64 * 250.0;

        experience.push(exp);
        education.push(EDUCATION[edu]);
        remote.push(ratio);
        size.push(SIZES[sz]);
        employment.push(EMPLOYMENT[emp]);
        work_year.push(year);
        title.push(TITLES[i % TITLES.len()]);
        salary.push(pay);
    }

    df!(
        "experience_years" => experience,
        "education_level" => education,
        "remote_ratio" => remote,
        "company_size" => size,
        "employment_type" => employment,
        "work_year" => work_year,
        "job_title" => title,
        "salary" => salary
    )
    .unwrap()
}

/// Default configuration rooted in `dir`, with small models for speed.
pub fn fast_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.data.raw_data_path = dir.join("salary_dataset.csv");
    config.data.processed_data_dir = dir.join("data");
    config.data.models_dir = dir.join("models");
    config.model.random_forest.n_estimators = 12;
    config.model.random_forest.max_depth = Some(8);
    config.model.gradient_boosting.n_estimators = 25;
    config.model.gradient_boosting.max_depth = 3;
    config.model.support_vector.max_iter = 60;
    config
}

pub fn valid_record() -> Value {
    json!({
        "experience_years": 5,
        "education_level": "Master",
        "company_size": "Medium",
        "employment_type": "Full-time",
        "remote_ratio": 50,
        "work_year": 2023,
        "job_title": "Data Scientist"
    })
}
