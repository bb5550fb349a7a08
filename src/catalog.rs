// Catalog helpers
// Read-side views over one owner's MovieList. No database access here.

use std::cmp::Ordering;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::db::movies::{Movie, MovieList};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub count: usize,
    pub average: f64,
    pub median: f64,
    pub best: Vec<String>,
    pub worst: Vec<String>,
}

/// Optional, inclusive bounds. A missing bound does not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovieFilter {
    pub min_rating: Option<f64>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
}

fn title_order(a: &Movie, b: &Movie) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

/// Highest rating first; equal ratings fall back to title order.
pub fn sorted_by_rating(list: &MovieList) -> Vec<&Movie> {
    let mut movies: Vec<&Movie> = list.iter().collect();
    movies.sort_by(|a, b| {
        b.rating
            .partial_cmp(&a.rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| title_order(a, b))
    });
    movies
}

pub fn sorted_by_year(list: &MovieList, newest_first: bool) -> Vec<&Movie> {
    let mut movies: Vec<&Movie> = list.iter().collect();
    movies.sort_by(|a, b| {
        let by_year = if newest_first {
            b.year.cmp(&a.year)
        } else {
            a.year.cmp(&b.year)
        };
        by_year.then_with(|| title_order(a, b))
    });
    movies
}

/// Average, median, best and worst. `None` for an empty list.
pub fn stats(list: &MovieList) -> Option<CatalogStats> {
    if list.is_empty() {
        return None;
    }

    let mut ratings: Vec<f64> = list.iter().map(|m| m.rating).collect();
    ratings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = ratings.len();
    let average = ratings.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        ratings[n / 2]
    } else {
        (ratings[n / 2 - 1] + ratings[n / 2]) / 2.0
    };

    let min_rating = ratings[0];
    let max_rating = ratings[n - 1];
    let titles_with = |rating: f64| -> Vec<String> {
        list.iter()
            .filter(|m| m.rating == rating)
            .map(|m| m.title.clone())
            .collect()
    };

    Some(CatalogStats {
        count: n,
        average,
        median,
        best: titles_with(max_rating),
        worst: titles_with(min_rating),
    })
}

/// Case-insensitive substring match on the title.
pub fn search<'a>(list: &'a MovieList, keyword: &str) -> Vec<&'a Movie> {
    let needle = keyword.trim().to_lowercase();
    list.iter()
        .filter(|m| m.title.to_lowercase().contains(&needle))
        .collect()
}

/// Close matches for a keyword that found nothing, best first, at most `limit`.
/// Scored with a skim-style fuzzy matcher, so the keyword's characters must
/// appear in order in the title; case is ignored.
pub fn suggest<'a>(list: &'a MovieList, keyword: &str, limit: usize) -> Vec<&'a Movie> {
    let query = keyword.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut ranked: Vec<(i64, &Movie)> = list
        .iter()
        .filter_map(|m| matcher.fuzzy_match(&m.title, query).map(|score| (score, m)))
        .collect();

    ranked.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| a.title.len().cmp(&b.title.len()))
            .then_with(|| title_order(a, b))
    });
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, m)| m).collect()
}

pub fn filter<'a>(list: &'a MovieList, criteria: &MovieFilter) -> Vec<&'a Movie> {
    list.iter()
        .filter(|m| criteria.min_rating.map_or(true, |min| m.rating >= min))
        .filter(|m| criteria.start_year.map_or(true, |start| m.year >= start))
        .filter(|m| criteria.end_year.map_or(true, |end| m.year <= end))
        .collect()
}

pub fn pick_random<'a, R: Rng + ?Sized>(list: &'a MovieList, rng: &mut R) -> Option<&'a Movie> {
    let movies: Vec<&Movie> = list.iter().collect();
    movies.choose(rng).copied()
}
