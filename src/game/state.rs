use serde::{Deserialize, Serialize};

// Virtual table coordinates - both players render the same field
pub const TABLE_WIDTH: f32 = 1000.0;
pub const TABLE_HEIGHT: f32 = 500.0;
pub const BALL_RADIUS: f32 = 11.0;

/// Rack order, row by row from the apex. The 8-ball sits in the middle of row three.
const RACK_ORDER: [u8; 15] = [1, 9, 2, 10, 8, 3, 11, 7, 14, 4, 5, 13, 15, 6, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallGroup {
    Solid,
    Stripe,
}

impl BallGroup {
    /// Group of a numbered ball; the cue ball and the 8-ball belong to neither
    pub fn of(number: u8) -> Option<Self> {
        match number {
            1..=7 => Some(BallGroup::Solid),
            9..=15 => Some(BallGroup::Stripe),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            BallGroup::Solid => BallGroup::Stripe,
            BallGroup::Stripe => BallGroup::Solid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// 0 is the cue ball
    pub number: u8,
    pub x: f32,
    pub y: f32,
    pub pocketed: bool,
}

impl Ball {
    pub fn new(number: u8, x: f32, y: f32) -> Self {
        Self {
            number,
            x,
            y,
            pocketed: false,
        }
    }
}

/// Everything a joining player needs to render and continue the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableState {
    pub balls: Vec<Ball>,
    /// Player whose turn it is (1 or 2)
    pub current_player: u8,
    /// Assigned once the first legal ball is pocketed
    pub player1_group: Option<BallGroup>,
    pub player1_pocketed: Vec<u8>,
    pub player2_pocketed: Vec<u8>,
    pub game_over: bool,
    pub winner: Option<u8>,
}

impl TableState {
    /// Fresh game: cue ball behind the head string, fifteen balls racked
    pub fn racked() -> Self {
        let center_y = TABLE_HEIGHT / 2.0;
        let apex_x = TABLE_WIDTH * 0.7;
        let spacing = BALL_RADIUS * 2.0;
        let row_step = spacing * 3f32.sqrt() / 2.0;

        let mut balls = vec![Ball::new(0, TABLE_WIDTH * 0.25, center_y)];
        let mut order = RACK_ORDER.iter();
        for row in 0..5 {
            for slot in 0..=row {
                if let Some(&number) = order.next() {
                    let x = apex_x + row as f32 * row_step;
                    let y = center_y + (slot as f32 - row as f32 / 2.0) * spacing;
                    balls.push(Ball::new(number, x, y));
                }
            }
        }

        Self {
            balls,
            current_player: 1,
            player1_group: None,
            player1_pocketed: Vec::new(),
            player2_pocketed: Vec::new(),
            game_over: false,
            winner: None,
        }
    }

    pub fn group_of(&self, player: u8) -> Option<BallGroup> {
        match player {
            1 => self.player1_group,
            _ => self.player1_group.map(BallGroup::other),
        }
    }

    pub fn ball(&self, number: u8) -> Option<&Ball> {
        self.balls.iter().find(|b| b.number == number)
    }
}

impl Default for TableState {
    fn default() -> Self {
        Self::racked()
    }
}
