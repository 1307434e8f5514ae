//! Turns questionnaire answers into a generation request.
//!
//! Question order is fixed by the questionnaire: majors first, then the
//! intended position (last answer wins), then campus activities.

use serde::{Deserialize, Serialize};

use super::types::GenerateRequest;
use crate::models::content::{BasicInfo, CampusEntry, EducationEntry, InternshipEntry, ResumeData, MASK};

const MAX_CAMPUS_ENTRIES: usize = 4;
const FIRST_ENROLLMENT_YEAR: u32 = 2021;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    #[serde(default)]
    pub answers: Vec<String>,
}

pub fn build_generate_request(qas: &[QuestionAnswer]) -> GenerateRequest {
    let info: String = qas
        .iter()
        .map(|qa| format!("{}{}\n", qa.question, qa.answers.join(",")))
        .collect();

    let job_title = job_title(qas);
    let data = ResumeData {
        basic: BasicInfo {
            name: "姓名".into(),
            phone: "12345678901".into(),
            email: "morgenAI".into(),
            job_title: job_title.clone().unwrap_or_default(),
            ..Default::default()
        },
        education: education(qas),
        campus: campus(qas),
        internship: job_title.map(internship).unwrap_or_default(),
        project: Vec::new(),
        skills: MASK.into(),
        self_evaluation: MASK.into(),
    };

    GenerateRequest { data, info }
}

fn job_title(qas: &[QuestionAnswer]) -> Option<String> {
    qas.get(1).and_then(|qa| qa.answers.last()).cloned()
}

fn education(qas: &[QuestionAnswer]) -> Vec<EducationEntry> {
    let Some(first) = qas.first() else {
        return Vec::new();
    };
    first
        .answers
        .iter()
        .map(|major| EducationEntry {
            school_name: "xx大学".into(),
            major: major.clone(),
            start_time: "2021-09".into(),
            end_time: "2025-06".into(),
            description: MASK.into(),
            ..Default::default()
        })
        .collect()
}

fn campus(qas: &[QuestionAnswer]) -> Vec<CampusEntry> {
    let Some(activities) = qas.get(2) else {
        return Vec::new();
    };
    activities
        .answers
        .iter()
        .take(MAX_CAMPUS_ENTRIES)
        .zip(FIRST_ENROLLMENT_YEAR..)
        .map(|(title, year)| CampusEntry {
            title: title.clone(),
            role: MASK.into(),
            start_time: format!("{year}.09"),
            end_time: format!("{}.06", year + 1),
            description: MASK.into(),
        })
        .collect()
}

fn internship(job_title: String) -> Vec<InternshipEntry> {
    vec![InternshipEntry {
        company: "xxx公司".into(),
        position: format!("{job_title}实习生"),
        start_time: "2021.09".into(),
        end_time: "2022.06".into(),
        description: MASK.into(),
    }]
}
