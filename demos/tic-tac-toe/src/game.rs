use boardroom::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum Mark {
    X,
    O,
}

impl Mark {
    fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

/// `misere`: whoever completes a line loses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub misere: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct State {
    board: [Option<Mark>; 9],
    players: [ParticipantId; 2],
    turn: usize, // index into players: 0 = X, 1 = O
    misere: bool,
    winner: Option<ParticipantId>,
    finished: bool,
}

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

// ---------------------------------------------------------------------------
// Game logic
// ---------------------------------------------------------------------------

pub struct TicTacToe;

impl RuleEngine for TicTacToe {
    type Config = Config;
    type State = State;

    fn meta(&self) -> GameMeta {
        GameMeta::new("tic-tac-toe", "Tic-Tac-Toe")
            .description("Three in a row on a 3x3 grid. Cells are numbered 0-8.")
            .players(2, 2)
            .seat(SeatSpec::human().named("X"))
            .seat(SeatSpec::human().named("O"))
            .tag("classic")
    }

    fn init(&self, config: &Config, participants: &[Participant]) -> Result<State, RuleError> {
        let [x, o] = participants else {
            return Err(RuleError::Seating("exactly two players".into()));
        };
        Ok(State {
            board: [None; 9],
            players: [x.id, o.id],
            turn: 0,
            misere: config.misere,
            winner: None,
            finished: false,
        })
    }

    fn current_actor(&self, state: &State) -> Option<ParticipantId> {
        if state.finished {
            return None;
        }
        Some(state.players[state.turn])
    }

    fn is_terminal(&self, state: &State) -> bool {
        state.finished
    }

    fn validate(&self, state: &State, _actor: &Participant, action: &Action) -> Result<(), String> {
        if action.name != "place" {
            return Err(format!("unknown action '{}', expected 'place'", action.name));
        }
        let cell = cell_param(action).ok_or("cell must be an integer 0-8")?;
        if state.board[cell].is_some() {
            return Err(format!("cell {cell} is occupied"));
        }
        Ok(())
    }

    fn apply(&self, state: &State, actor: &Participant, action: &Action) -> Result<State, RuleError> {
        let cell = cell_param(action)
            .ok_or_else(|| RuleError::Fault("place without a valid cell".into()))?;
        let mark = mark_for(state.turn);
        let mut next = state.clone();
        next.board[cell] = Some(mark);

        if completes_line(&next.board, mark) {
            next.finished = true;
            next.winner = Some(if next.misere {
                next.players[1 - next.turn]
            } else {
                actor.id
            });
        } else if next.board.iter().all(Option::is_some) {
            next.finished = true;
        } else {
            next.turn = 1 - next.turn;
        }
        Ok(next)
    }

    fn view(&self, state: &State, viewer: &Participant) -> ViewFields {
        let board: Vec<Value> = state
            .board
            .iter()
            .map(|cell| cell.map_or(Value::Null, |m| Value::from(m.as_str())))
            .collect();
        let mark = state
            .players
            .iter()
            .position(|id| *id == viewer.id)
            .map(|turn| mark_for(turn).as_str());

        ViewFields::new()
            .field("board", board)
            .field("your_mark", mark)
            .field("to_move", mark_for(state.turn).as_str())
            .field("finished", state.finished)
            .field("winner", state.winner.map(|id| id.0))
            .field("misere", state.misere)
    }

    fn valid_actions(&self, state: &State, _actor: &Participant) -> Vec<ActionSpec> {
        let empty = empty_cells(state);
        if empty.is_empty() {
            return Vec::new();
        }
        vec![ActionSpec::new("place", "Place your mark").with_schema(json!({
            "type": "object",
            "required": ["cell"],
            "properties": {"cell": {"enum": empty}}
        }))]
    }

    // A seat that keeps failing has its moves played for it.
    fn elimination_rules(&self) -> EliminationRules {
        EliminationRules::forfeit()
    }

    fn default_action(&self, state: &State, _actor: &Participant) -> Option<Action> {
        empty_cells(state)
            .first()
            .map(|cell| Action::with_params("place", json!({ "cell": cell })))
    }
}

fn mark_for(turn: usize) -> Mark {
    if turn == 0 { Mark::X } else { Mark::O }
}

fn cell_param(action: &Action) -> Option<usize> {
    action
        .param("cell")
        .and_then(Value::as_u64)
        .and_then(|c| usize::try_from(c).ok())
        .filter(|c| *c < 9)
}

fn empty_cells(state: &State) -> Vec<usize> {
    (0..9).filter(|i| state.board[*i].is_none()).collect()
}

fn completes_line(board: &[Option<Mark>; 9], mark: Mark) -> bool {
    LINES
        .iter()
        .any(|line| line.iter().all(|i| board[*i] == Some(mark)))
}
