//! Conversations between talkers.

use shared::{DialogAnswerData, DialogData, DialogStageData, ObjectDialogData};

use super::ObjectKey;

#[derive(Debug, Clone, PartialEq)]
pub struct DialogStage {
    pub id: String,
    pub start: bool,
    pub answers: Vec<DialogAnswer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogAnswer {
    pub id: String,
    /// Next stage, `None` ends the dialog.
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DialogError {
    #[error("dialog already started: {0}")]
    AlreadyStarted(String),
    #[error("dialog has no start stage: {0}")]
    NoStartStage(String),
    #[error("dialog not started: {0}")]
    NotStarted(String),
    #[error("dialog has no active stage: {0}")]
    NoActiveStage(String),
    #[error("answer not found: {0}")]
    AnswerNotFound(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    id: String,
    stages: Vec<DialogStage>,
    stage: Option<String>,
    target: Option<ObjectKey>,
}

impl Dialog {
    pub fn from_data(data: &DialogData) -> Self {
        Self {
            id: data.id.clone(),
            stages: data
                .stages
                .iter()
                .map(|s| DialogStage {
                    id: s.id.clone(),
                    start: s.start,
                    answers: s
                        .answers
                        .iter()
                        .map(|a| DialogAnswer {
                            id: a.id.clone(),
                            to: (!a.to.is_empty()).then(|| a.to.clone()),
                        })
                        .collect(),
                })
                .collect(),
            stage: (!data.stage.is_empty()).then(|| data.stage.clone()),
            target: (!data.target_id.is_empty())
                .then(|| ObjectKey::new(&data.target_id, &data.target_serial)),
        }
    }

    pub fn to_data(&self) -> DialogData {
        DialogData {
            id: self.id.clone(),
            stage: self.stage.clone().unwrap_or_default(),
            target_id: self.target.as_ref().map(|t| t.id.clone()).unwrap_or_default(),
            target_serial: self
                .target
                .as_ref()
                .map(|t| t.serial.clone())
                .unwrap_or_default(),
            stages: self
                .stages
                .iter()
                .map(|s| DialogStageData {
                    id: s.id.clone(),
                    start: s.start,
                    answers: s
                        .answers
                        .iter()
                        .map(|a| DialogAnswerData {
                            id: a.id.clone(),
                            to: a.to.clone().unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> Option<&ObjectKey> {
        self.target.as_ref()
    }

    pub fn stage(&self) -> Option<&DialogStage> {
        let id = self.stage.as_ref()?;
        self.stages.iter().find(|s| &s.id == id)
    }

    /// Starts the conversation with the specified target at the first start
    /// stage.
    pub fn start(&mut self, target: ObjectKey) -> Result<(), DialogError> {
        if self.target.is_some() {
            return Err(DialogError::AlreadyStarted(self.id.clone()));
        }
        let start = self
            .stages
            .iter()
            .find(|s| s.start)
            .or_else(|| self.stages.first())
            .ok_or_else(|| DialogError::NoStartStage(self.id.clone()))?;
        self.stage = Some(start.id.clone());
        self.target = Some(target);
        Ok(())
    }

    /// Applies the answer with the specified ID to the active stage.
    pub fn answer(&mut self, answer_id: &str) -> Result<(), DialogError> {
        if self.target.is_none() {
            return Err(DialogError::NotStarted(self.id.clone()));
        }
        let stage = self
            .stage()
            .ok_or_else(|| DialogError::NoActiveStage(self.id.clone()))?;
        let answer = stage
            .answers
            .iter()
            .find(|a| a.id == answer_id)
            .ok_or_else(|| DialogError::AnswerNotFound(answer_id.to_string()))?;
        match answer.to.clone() {
            Some(next) => self.stage = Some(next),
            None => self.end(),
        }
        Ok(())
    }

    /// Ends the conversation and resets the dialog.
    pub fn end(&mut self) {
        self.target = None;
        self.stage = None;
    }

    /// Dialog state for client responses.
    pub fn state(&self) -> ObjectDialogData {
        ObjectDialogData {
            dialog_id: self.id.clone(),
            dialog_stage: self.stage.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting() -> Dialog {
        Dialog::from_data(&DialogData {
            id: "greet".to_string(),
            stages: vec![
                DialogStageData {
                    id: "hello".to_string(),
                    start: true,
                    answers: vec![
                        DialogAnswerData {
                            id: "ask".to_string(),
                            to: "rumors".to_string(),
                        },
                        DialogAnswerData {
                            id: "bye".to_string(),
                            to: String::new(),
                        },
                    ],
                },
                DialogStageData {
                    id: "rumors".to_string(),
                    start: false,
                    answers: vec![DialogAnswerData {
                        id: "bye".to_string(),
                        to: String::new(),
                    }],
                },
            ],
            ..Default::default()
        })
    }

    #[test]
    fn test_start_and_answer() {
        let mut dialog = greeting();
        let hero = ObjectKey::new("hero", "0");

        dialog.start(hero.clone()).unwrap();
        assert_eq!(dialog.target(), Some(&hero));
        assert_eq!(dialog.stage().unwrap().id, "hello");

        dialog.answer("ask").unwrap();
        assert_eq!(dialog.state().dialog_stage, "rumors");

        dialog.answer("bye").unwrap();
        assert!(dialog.target().is_none());
        assert!(dialog.stage().is_none());
    }

    #[test]
    fn test_start_twice() {
        let mut dialog = greeting();
        dialog.start(ObjectKey::new("hero", "0")).unwrap();
        assert_eq!(
            dialog.start(ObjectKey::new("other", "1")),
            Err(DialogError::AlreadyStarted("greet".to_string()))
        );
    }

    #[test]
    fn test_answer_errors() {
        let mut dialog = greeting();
        assert!(matches!(dialog.answer("ask"), Err(DialogError::NotStarted(_))));

        dialog.start(ObjectKey::new("hero", "0")).unwrap();
        assert_eq!(
            dialog.answer("dance"),
            Err(DialogError::AnswerNotFound("dance".to_string()))
        );
    }

    #[test]
    fn test_data_conversion_keeps_state() {
        let mut dialog = greeting();
        dialog.start(ObjectKey::new("hero", "0")).unwrap();

        let restored = Dialog::from_data(&dialog.to_data());
        assert_eq!(restored, dialog);
    }
}
