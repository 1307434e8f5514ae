//! Structured resume content.
//!
//! `ResumeData` is the shape the generation and data services speak (their JSON
//! keys are the Chinese section/field names, kept verbatim via serde renames).
//! Inside the service, content is handled as a list of [`ModuleSection`]s whose
//! payload is the [`ModuleData`] tagged union, so scoring and persistence never
//! look fields up by string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder the generation service fills in.
pub const MASK: &str = "[MASK]";

// ────────────────────────────────────────────────────────────────────────────
// Module kinds
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    BasicInfo,
    Education,
    Campus,
    Internship,
    Project,
    Skills,
    SelfEvaluation,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 7] = [
        ModuleKind::BasicInfo,
        ModuleKind::Education,
        ModuleKind::Campus,
        ModuleKind::Internship,
        ModuleKind::Project,
        ModuleKind::Skills,
        ModuleKind::SelfEvaluation,
    ];

    pub fn id(self) -> i64 {
        match self {
            ModuleKind::BasicInfo => 1,
            ModuleKind::Education => 2,
            ModuleKind::Campus => 3,
            ModuleKind::Internship => 4,
            ModuleKind::Project => 5,
            ModuleKind::Skills => 6,
            ModuleKind::SelfEvaluation => 7,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Section title; also the key of the section in scoring requests.
    pub fn title(self) -> &'static str {
        match self {
            ModuleKind::BasicInfo => "基本信息",
            ModuleKind::Education => "教育背景",
            ModuleKind::Campus => "在校经历",
            ModuleKind::Internship => "实习经历",
            ModuleKind::Project => "项目经历",
            ModuleKind::Skills => "技能证书",
            ModuleKind::SelfEvaluation => "自我评价",
        }
    }

    /// Range of dimension score target ids owned by this module.
    pub fn dimension_id_range(self) -> std::ops::RangeInclusive<i64> {
        let base = self.id() * 100;
        (base + 1)..=(base + 99)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire records
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(rename = "姓名", default)]
    pub name: String,
    #[serde(rename = "电话", default)]
    pub phone: String,
    #[serde(rename = "邮箱", default)]
    pub email: String,
    #[serde(rename = "意向岗位", default)]
    pub job_title: String,
    #[serde(rename = "出生日期", default, skip_serializing_if = "String::is_empty")]
    pub birthday: String,
    #[serde(rename = "民族", default, skip_serializing_if = "String::is_empty")]
    pub ethnicity: String,
    #[serde(rename = "政治面貌", default, skip_serializing_if = "String::is_empty")]
    pub politics: String,
    #[serde(rename = "所在地", default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(rename = "意向城市", default, skip_serializing_if = "String::is_empty")]
    pub target_city: String,
    #[serde(rename = "期望薪资上限", default, skip_serializing_if = "String::is_empty")]
    pub max_salary: String,
    #[serde(rename = "期望薪资下限", default, skip_serializing_if = "String::is_empty")]
    pub min_salary: String,
    #[serde(rename = "求职类型", default, skip_serializing_if = "String::is_empty")]
    pub job_type: String,
}

impl BasicInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.phone.is_empty() && self.email.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(rename = "学校名称", default)]
    pub school_name: String,
    #[serde(rename = "学历", default)]
    pub degree: String,
    #[serde(rename = "专业", default)]
    pub major: String,
    #[serde(rename = "入学时间", default)]
    pub start_time: String,
    #[serde(rename = "毕业时间", default)]
    pub end_time: String,
    #[serde(rename = "经历描述", default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampusEntry {
    #[serde(rename = "经历名称", default)]
    pub title: String,
    #[serde(rename = "角色", default)]
    pub role: String,
    #[serde(rename = "开始时间", default)]
    pub start_time: String,
    #[serde(rename = "结束时间", default)]
    pub end_time: String,
    #[serde(rename = "经历描述", default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternshipEntry {
    #[serde(rename = "公司名称", default)]
    pub company: String,
    #[serde(rename = "职位", default)]
    pub position: String,
    #[serde(rename = "开始时间", default)]
    pub start_time: String,
    #[serde(rename = "结束时间", default)]
    pub end_time: String,
    #[serde(rename = "工作内容", default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(rename = "项目名称", default)]
    pub project_name: String,
    #[serde(rename = "角色", default)]
    pub role: String,
    #[serde(rename = "开始时间", default)]
    pub start_time: String,
    #[serde(rename = "结束时间", default)]
    pub end_time: String,
    #[serde(rename = "项目描述", default)]
    pub description: String,
}

/// Full structured resume as produced by the generation and data services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeData {
    #[serde(flatten)]
    pub basic: BasicInfo,
    #[serde(rename = "教育经历", default)]
    pub education: Vec<EducationEntry>,
    #[serde(rename = "在校经历", default)]
    pub campus: Vec<CampusEntry>,
    #[serde(rename = "实习经历", default)]
    pub internship: Vec<InternshipEntry>,
    #[serde(rename = "项目经历", default)]
    pub project: Vec<ProjectEntry>,
    #[serde(rename = "技能证书", default)]
    pub skills: String,
    #[serde(rename = "自我评价", default)]
    pub self_evaluation: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Module sections
// ────────────────────────────────────────────────────────────────────────────

/// One module's payload, keyed by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum ModuleData {
    BasicInfo(BasicInfo),
    Education(Vec<EducationEntry>),
    Campus(Vec<CampusEntry>),
    Internship(Vec<InternshipEntry>),
    Project(Vec<ProjectEntry>),
    Skills(String),
    SelfEvaluation(String),
}

impl ModuleData {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleData::BasicInfo(_) => ModuleKind::BasicInfo,
            ModuleData::Education(_) => ModuleKind::Education,
            ModuleData::Campus(_) => ModuleKind::Campus,
            ModuleData::Internship(_) => ModuleKind::Internship,
            ModuleData::Project(_) => ModuleKind::Project,
            ModuleData::Skills(_) => ModuleKind::Skills,
            ModuleData::SelfEvaluation(_) => ModuleKind::SelfEvaluation,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ModuleData::BasicInfo(b) => b.is_empty(),
            ModuleData::Education(v) => v.is_empty(),
            ModuleData::Campus(v) => v.is_empty(),
            ModuleData::Internship(v) => v.is_empty(),
            ModuleData::Project(v) => v.is_empty(),
            ModuleData::Skills(s) | ModuleData::SelfEvaluation(s) => s.is_empty(),
        }
    }

    /// The value placed under the module title in a scoring request.
    pub fn scoring_payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            ModuleData::BasicInfo(b) => serde_json::to_value(b),
            ModuleData::Education(v) => serde_json::to_value(v),
            ModuleData::Campus(v) => serde_json::to_value(v),
            ModuleData::Internship(v) => serde_json::to_value(v),
            ModuleData::Project(v) => serde_json::to_value(v),
            ModuleData::Skills(s) | ModuleData::SelfEvaluation(s) => Ok(Value::String(s.clone())),
        }
    }

    /// Replaces the free-text part of this module with [`MASK`].
    fn masked(mut self) -> Self {
        match &mut self {
            ModuleData::BasicInfo(_) => {}
            ModuleData::Education(v) => v.iter_mut().for_each(|e| e.description = MASK.into()),
            ModuleData::Campus(v) => v.iter_mut().for_each(|e| e.description = MASK.into()),
            ModuleData::Internship(v) => v.iter_mut().for_each(|e| e.description = MASK.into()),
            ModuleData::Project(v) => v.iter_mut().for_each(|e| e.description = MASK.into()),
            ModuleData::Skills(s) | ModuleData::SelfEvaluation(s) => *s = MASK.into(),
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSection {
    pub module_id: i64,
    pub title: String,
    pub data: ModuleData,
}

impl ModuleSection {
    pub fn new(data: ModuleData) -> Self {
        let kind = data.kind();
        Self {
            module_id: kind.id(),
            title: kind.title().to_string(),
            data,
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.data.kind()
    }
}

impl ResumeData {
    /// Splits the resume into all seven module sections in kind order.
    pub fn into_all_sections(self) -> Vec<ModuleSection> {
        [
            ModuleData::BasicInfo(self.basic),
            ModuleData::Education(self.education),
            ModuleData::Campus(self.campus),
            ModuleData::Internship(self.internship),
            ModuleData::Project(self.project),
            ModuleData::Skills(self.skills),
            ModuleData::SelfEvaluation(self.self_evaluation),
        ]
        .into_iter()
        .map(ModuleSection::new)
        .collect()
    }

    /// Like [`Self::into_all_sections`], skipping empty modules.
    pub fn into_sections(self) -> Vec<ModuleSection> {
        self.into_all_sections()
            .into_iter()
            .filter(|s| !s.data.is_empty())
            .collect()
    }

    /// Reassembles a resume from stored sections. The section whose kind equals
    /// `mask` has its free text replaced by [`MASK`].
    pub fn from_sections(sections: &[ModuleSection], mask: Option<ModuleKind>) -> Self {
        let mut data = ResumeData::default();
        for section in sections {
            let payload = if mask == Some(section.kind()) {
                section.data.clone().masked()
            } else {
                section.data.clone()
            };
            match payload {
                ModuleData::BasicInfo(b) => data.basic = b,
                ModuleData::Education(v) => data.education = v,
                ModuleData::Campus(v) => data.campus = v,
                ModuleData::Internship(v) => data.internship = v,
                ModuleData::Project(v) => data.project = v,
                ModuleData::Skills(s) => data.skills = s,
                ModuleData::SelfEvaluation(s) => data.self_evaluation = s,
            }
        }
        data
    }

    /// File name used for the relational row and rendered deliverable.
    pub fn display_name(&self) -> String {
        format!("{}-简历", self.basic.name)
    }
}

/// Document-store record: the full content of one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeContent {
    pub resume_id: i64,
    pub modules: Vec<ModuleSection>,
    #[serde(default)]
    pub raw_markdown: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeContent {
    pub fn new(resume_id: i64, modules: Vec<ModuleSection>, raw_markdown: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            resume_id,
            modules,
            raw_markdown,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn module(&self, kind: ModuleKind) -> Option<&ModuleSection> {
        self.modules.iter().find(|m| m.kind() == kind)
    }

    /// Inserts or replaces the section of the same kind, keeping kind order.
    pub fn upsert_module(&mut self, section: ModuleSection) {
        match self.modules.iter_mut().find(|m| m.kind() == section.kind()) {
            Some(existing) => *existing = section,
            None => {
                self.modules.push(section);
                self.modules.sort_by_key(|m| m.kind());
            }
        }
        self.updated_at = Utc::now();
    }
}
