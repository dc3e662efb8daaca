use serde::{Deserialize, Serialize};

/// Leading glyph marking a flagged task in day-tracker documents.
pub const FLAG_GLYPH: &str = "🚩 ";

/// Section membership of a task on the day board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Backlog,
    InProgress,
    Done,
}

impl Role {
    /// All roles in board order. Lookups scan in this order.
    pub const ALL: [Role; 3] = [Role::Backlog, Role::InProgress, Role::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Backlog => "backlog",
            Role::InProgress => "inProgress",
            Role::Done => "done",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flagged: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            done: false,
            flagged: false,
        }
    }
}

/// The three ordered task lists of one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBoard {
    #[serde(default)]
    pub backlog: Vec<Task>,
    #[serde(default)]
    pub in_progress: Vec<Task>,
    #[serde(default)]
    pub done: Vec<Task>,
}

impl TaskBoard {
    pub fn list(&self, role: Role) -> &Vec<Task> {
        match role {
            Role::Backlog => &self.backlog,
            Role::InProgress => &self.in_progress,
            Role::Done => &self.done,
        }
    }

    pub fn list_mut(&mut self, role: Role) -> &mut Vec<Task> {
        match role {
            Role::Backlog => &mut self.backlog,
            Role::InProgress => &mut self.in_progress,
            Role::Done => &mut self.done,
        }
    }

    /// A board holding a single read-only list in its backlog.
    pub fn from_backlog(tasks: Vec<Task>) -> Self {
        Self {
            backlog: tasks,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.backlog.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Logical view a caller asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Daily,
    Weekly,
    #[serde(alias = "history")]
    Achieved,
}

/// Which physical store backed a board response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardSource {
    DayTrack,
    Archived,
    PlanPreview,
    WeeklyPlan,
    None,
}

/// View and optional date addressed by a request. A missing date means today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub view: View,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Scope {
    pub fn daily(date: impl Into<String>) -> Self {
        Self {
            view: View::Daily,
            date: Some(date.into()),
        }
    }

    pub fn today() -> Self {
        Self::default()
    }

    pub fn weekly() -> Self {
        Self {
            view: View::Weekly,
            date: None,
        }
    }
}

/// Partial update applied by `update_task`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl TaskUpdate {
    pub fn moves(&self) -> bool {
        self.role.is_some() || self.index.is_some()
    }
}

/// A done task recovered from an archived day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievedTask {
    pub date: String,
    #[serde(flatten)]
    pub task: Task,
}

/// Board response for `get_board`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub view: View,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub source: BoardSource,
    pub tasks: TaskBoard,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bot_tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tomorrow_tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub achieved: Vec<AchievedTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BoardSnapshot {
    pub fn empty(view: View, date: Option<String>, message: Option<&str>) -> Self {
        Self {
            view,
            date,
            source: BoardSource::None,
            tasks: TaskBoard::default(),
            read_only: true,
            bot_tasks: Vec::new(),
            tomorrow_tasks: Vec::new(),
            achieved: Vec::new(),
            message: message.map(str::to_string),
        }
    }
}

/// Everything stored for one archived day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedDay {
    pub date: String,
    pub tasks: TaskBoard,
    #[serde(default)]
    pub bot_tasks: Vec<Task>,
    #[serde(default)]
    pub plan: Vec<Task>,
}
