//! Built-in lesson catalog: the intonation constructions and their levels.
//!
//! Each level carries the phrase identifier the analysis server expects, so
//! nothing downstream ever has to map the display phrase back to a server
//! id by text matching.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy)]
pub struct IntonationConstruction {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub levels: &'static [Level],
}

#[derive(Debug, Clone, Copy)]
pub struct Level {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// The phrase the learner is asked to pronounce.
    pub phrase: &'static str,
    /// Identifier for this phrase on the analysis server, fixed at
    /// content-authoring time.
    pub server_phrase_id: &'static str,
    /// Bundled reference pronunciation, relative to the assets directory.
    pub reference_audio: &'static str,
    pub difficulty: Difficulty,
}

pub const CONSTRUCTIONS: &[IntonationConstruction] = &[
    IntonationConstruction {
        id: "ik1",
        title: "ИК-1",
        description: "Falling contour of completed statements; used in \
                      declarative sentences and special questions.",
        levels: &[
            Level {
                id: "ik1_level1",
                title: "Это мой дом",
                description: "A simple declarative sentence with ИК-1.",
                phrase: "Это мой дом",
                server_phrase_id: "Its_my_house",
                reference_audio: "ik1/Its_my_house/Its_my_house44.wav",
                difficulty: Difficulty::Easy,
            },
            Level {
                id: "ik1_level2",
                title: "Скоро наступит зима",
                description: "A sentence ending on ИК-1.",
                phrase: "Скоро наступит зима",
                server_phrase_id: "Winter_is_coming_soon",
                reference_audio: "ik1/Winter_is_coming_soon/Winter_is_coming_soon44.wav",
                difficulty: Difficulty::Medium,
            },
            Level {
                id: "ik1_level3",
                title: "Москва - столица России",
                description: "A declarative sentence with ИК-1.",
                phrase: "Москва - столица России",
                server_phrase_id: "Moscow_is_the_capital_of_Russia",
                reference_audio: "ik1/Moscow_is_the_capital_of_Russia/Moscow_is_the_capital_of_Russia45.wav",
                difficulty: Difficulty::Hard,
            },
        ],
    },
    IntonationConstruction {
        id: "ik2",
        title: "ИК-2",
        description: "Contour of commands and wh-questions; used in \
                      imperatives and questions with a question word.",
        levels: &[
            Level {
                id: "ik2_level1",
                title: "Кто пришёл?",
                description: "An interrogative sentence with ИК-2.",
                phrase: "Кто пришёл?",
                server_phrase_id: "Whos_here",
                reference_audio: "ik2/Whos_here/Whos_here44.wav",
                difficulty: Difficulty::Easy,
            },
            Level {
                id: "ik2_level2",
                title: "Где ты был?",
                description: "A question with a question word.",
                phrase: "Где ты был?",
                server_phrase_id: "Where_were_you",
                reference_audio: "ik2/Where_were_you/Where_were_you43.wav",
                difficulty: Difficulty::Medium,
            },
            Level {
                id: "ik2_level3",
                title: "Как тебя зовут?",
                description: "A question with a question word.",
                phrase: "Как тебя зовут?",
                server_phrase_id: "Whats_your_name",
                reference_audio: "ik2/Whats_your_name/Whats_your_name43.wav",
                difficulty: Difficulty::Hard,
            },
        ],
    },
];

pub fn construction_by_id(id: &str) -> Option<&'static IntonationConstruction> {
    CONSTRUCTIONS.iter().find(|c| c.id == id)
}

/// Looks up a level together with the construction that owns it.
pub fn level_by_id(
    construction_id: &str,
    level_id: &str,
) -> Option<(&'static IntonationConstruction, &'static Level)> {
    let construction = construction_by_id(construction_id)?;
    let level = construction.levels.iter().find(|l| l.id == level_id)?;
    Some((construction, level))
}
