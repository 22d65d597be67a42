mod user;
pub use user::{UserCreate, UserEntity, UserUpdate};

mod course;
pub use course::{
    CatalogueFilter, Course, CourseAnalytics, CourseCategory, CourseCreate, CourseDetails,
    CourseLevel, CourseStatus, CourseUpdate,
};

mod module;
pub use module::{Module, ModuleCreate, ModuleUpdate};

mod lesson;
pub use lesson::{ContentType, Lesson, LessonCreate, LessonUpdate, LessonWithStatus};

mod lesson_progress;
pub use lesson_progress::LessonProgress;

mod enrollment;
pub use enrollment::{
    Enrollment, EnrollmentCreate, EnrollmentStatus, EnrollmentUpdate, EnrollmentWithStudent,
};

mod quiz;
pub use quiz::{
    OptionCreate, OptionView, QuestionCreate, QuestionRemoval, QuestionUpdate, QuestionView, Quiz,
    QuizCreate, QuizOption, QuizQuestion, QuizUpdate, QuizView, validate_options,
};

mod quiz_attempt;
pub use quiz_attempt::{QuizAttempt, QuizAttemptWithStudent, QuizStatistics};

mod assignment;
pub use assignment::{
    Assignment, AssignmentCreate, AssignmentStatistics, AssignmentUpdate, SubmissionType,
    UpcomingAssignment,
};

mod submission;
pub use submission::{Submission, SubmissionUpsert, SubmissionWithStudent};

mod notification;
pub use notification::{Notification, NotificationCreate, NotificationType};

mod review;
pub use review::{CourseReviews, HelpfulToggle, Review, ReviewCreate, ReviewUpdate, ReviewWithAuthor};

mod upload;
pub use upload::UploadRecord;

crate::impl_resource_typed! {
    UserEntity => User,
    Course => Course,
    Module => Module,
    Lesson => Lesson,
    LessonProgress => LessonProgress,
    Enrollment => Enrollment,
    Quiz => Quiz,
    QuizQuestion => QuizQuestion,
    QuizAttempt => QuizAttempt,
    Assignment => Assignment,
    Submission => Submission,
    Notification => Notification,
    Review => Review,
    UploadRecord => File,
}
